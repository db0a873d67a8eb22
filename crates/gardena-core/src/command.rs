// ── Mower commands ──
//
// Bus payloads map onto a closed command set. The dispatcher turns a
// command into one `MOWER_CONTROL` REST call; the router ties it to the
// current session's token and service id.

use std::fmt;
use std::sync::Arc;

use gardena_api::{AccessToken, MowerControl, MowerControlCommand, SmartClient};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::CoreError;
use crate::session::SessionContext;

const SECONDS_PER_HOUR: u64 = 3600;

// ── MowerCommand ─────────────────────────────────────────────────────

/// A command received from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MowerCommand {
    /// Park until the next scheduled task.
    Park,
    /// Mow for `hours`, overriding the schedule.
    StartFor { hours: u64 },
}

impl MowerCommand {
    /// Parse a bus payload. Unrecognized payloads yield `None`.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match payload {
            b"park" => Some(Self::Park),
            b"start_1h" => Some(Self::StartFor { hours: 1 }),
            b"start_3h" => Some(Self::StartFor { hours: 3 }),
            b"start_6h" => Some(Self::StartFor { hours: 6 }),
            _ => None,
        }
    }

    pub fn seconds(self) -> u64 {
        match self {
            Self::Park => 0,
            Self::StartFor { hours } => hours * SECONDS_PER_HOUR,
        }
    }

    pub fn control(self) -> MowerControl {
        let command = match self {
            Self::Park => MowerControlCommand::ParkUntilNextTask,
            Self::StartFor { .. } => MowerControlCommand::StartSecondsToOverride,
        };
        MowerControl {
            command,
            seconds: self.seconds(),
        }
    }
}

impl fmt::Display for MowerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Park => f.write_str("park"),
            Self::StartFor { hours } => write!(f, "start_{hours}h"),
        }
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────

/// A command the service accepted for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub service_id: String,
    pub control: MowerControl,
}

/// Issues mower commands against the smart system API.
#[derive(Clone)]
pub struct CommandDispatcher {
    client: Arc<SmartClient>,
}

impl CommandDispatcher {
    pub fn new(client: Arc<SmartClient>) -> Self {
        Self { client }
    }

    /// Send `command` to `service_id`. Anything but `202 Accepted` is a
    /// failure; nothing is retried.
    pub async fn dispatch(
        &self,
        command: MowerCommand,
        service_id: &str,
        token: &AccessToken,
    ) -> Result<Accepted, CoreError> {
        let control = command.control();
        match self.client.send_mower_command(token, service_id, control).await {
            Ok(()) => {
                info!(%command, service_id, seconds = control.seconds, "Command accepted");
                Ok(Accepted {
                    service_id: service_id.to_owned(),
                    control,
                })
            }
            Err(e) => {
                error!(
                    %command,
                    service_id,
                    status = e.status(),
                    error = %e,
                    "Command failed"
                );
                Err(e.into())
            }
        }
    }
}

// ── Router ───────────────────────────────────────────────────────────

/// Binds inbound bus commands to the current session.
#[derive(Clone)]
pub struct CommandRouter {
    dispatcher: CommandDispatcher,
    session: SessionContext,
}

impl CommandRouter {
    pub fn new(dispatcher: CommandDispatcher, session: SessionContext) -> Self {
        Self {
            dispatcher,
            session,
        }
    }

    /// Dispatch `command` for the mower `serial` with the current
    /// session's credentials.
    pub async fn execute(&self, serial: u64, command: MowerCommand) -> Result<Accepted, CoreError> {
        info!(serial, %command, "Received command");
        let (service_id, token) = self.session.command_target().inspect_err(|e| {
            error!(serial, %command, error = %e, "Cannot dispatch command");
        })?;
        self.dispatcher.dispatch(command, &service_id, &token).await
    }

    /// Run [`execute`](Self::execute) in the background so the bus
    /// network loop is never blocked on HTTP.
    pub fn spawn(&self, serial: u64, command: MowerCommand) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            // failures are logged where they happen
            let _ = router.execute(serial, command).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads() {
        assert_eq!(MowerCommand::from_payload(b"park"), Some(MowerCommand::Park));
        assert_eq!(
            MowerCommand::from_payload(b"start_3h"),
            Some(MowerCommand::StartFor { hours: 3 })
        );
        assert_eq!(MowerCommand::from_payload(b"start_2h"), None);
        assert_eq!(MowerCommand::from_payload(b"PARK"), None);
        assert_eq!(MowerCommand::from_payload(b" park"), None);
        assert_eq!(MowerCommand::from_payload(b""), None);
    }

    #[test]
    fn durations() {
        let secs: Vec<u64> = [&b"park"[..], b"start_1h", b"start_3h", b"start_6h"]
            .into_iter()
            .filter_map(MowerCommand::from_payload)
            .map(MowerCommand::seconds)
            .collect();
        assert_eq!(secs, vec![0, 3600, 10_800, 21_600]);
    }

    #[test]
    fn control_verbs() {
        assert_eq!(
            MowerCommand::Park.control().command,
            MowerControlCommand::ParkUntilNextTask
        );
        let start = MowerCommand::StartFor { hours: 6 }.control();
        assert_eq!(start.command, MowerControlCommand::StartSecondsToOverride);
        assert_eq!(start.seconds, 21_600);
    }

    #[test]
    fn display_matches_payload() {
        assert_eq!(MowerCommand::Park.to_string(), "park");
        assert_eq!(MowerCommand::StartFor { hours: 1 }.to_string(), "start_1h");
    }
}
