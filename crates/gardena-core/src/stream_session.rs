// ── Stream session manager ──
//
// Owns the push-stream lifecycle: token, location, stream URL, open
// stream. A session ends on remote close, transport error, missed pong,
// or shortly before the token expires; the manager then pauses for a
// fixed time and starts over from authentication, forever.

use std::sync::Arc;
use std::time::Duration;

use gardena_api::{AccessToken, PushStream, SmartClient};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::assembler::{EventAssembler, Outcome};
use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::model::DeviceSnapshot;
use crate::session::SessionContext;

// ── SessionPhase ─────────────────────────────────────────────────────

/// Stream session phase observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Authenticating,
    LocatingTarget,
    EstablishingStream,
    Streaming,
    Closed,
    Failed,
}

/// Why a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server closed the stream.
    Closed,
    /// The token is about to expire.
    Renewal,
    Cancelled,
}

enum Step {
    Frame(Result<Option<String>, gardena_api::Error>),
    Renew,
    Cancel,
}

// ── StreamSessionManager ─────────────────────────────────────────────

pub struct StreamSessionManager {
    client: Arc<SmartClient>,
    session: SessionContext,
    config: SessionConfig,
    phase: watch::Sender<SessionPhase>,
    snapshots: watch::Sender<Option<DeviceSnapshot>>,
}

impl StreamSessionManager {
    pub fn new(client: Arc<SmartClient>, session: SessionContext, config: SessionConfig) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        let (snapshots, _) = watch::channel(None);
        Self {
            client,
            session,
            config,
            phase,
            snapshots,
        }
    }

    /// Subscribe to phase changes.
    pub fn phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Subscribe to publishable snapshots of the current session.
    pub fn snapshots(&self) -> watch::Receiver<Option<DeviceSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Run sessions back to back until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            match self.run_once(&cancel).await {
                Ok(SessionEnd::Cancelled) => break,
                Ok(end) => {
                    info!(?end, "Stream session ended");
                    self.set_phase(SessionPhase::Closed);
                }
                Err(e) => {
                    error!(error = %e, "Stream session failed");
                    self.set_phase(SessionPhase::Failed);
                }
            }

            let pause = self.config.restart_pause;
            info!(pause_secs = pause.as_secs_f64(), "Restarting stream session after pause");
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }

        self.session.invalidate();
        self.set_phase(SessionPhase::Closed);
        debug!("Stream session loop exiting");
    }

    /// One session: authenticate, locate, open the stream, and feed it
    /// into a fresh assembler until it ends.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<SessionEnd, CoreError> {
        self.session.invalidate();
        self.snapshots.send_replace(None);

        self.set_phase(SessionPhase::Authenticating);
        let Some(token) = cancel.run_until_cancelled(self.client.authenticate()).await else {
            return Ok(SessionEnd::Cancelled);
        };
        let token = token?;
        info!(expires_at = %token.expires_at(), "Authenticated");
        self.session.begin(token.clone());

        self.set_phase(SessionPhase::LocatingTarget);
        let Some(locations) = cancel
            .run_until_cancelled(self.client.list_locations(&token))
            .await
        else {
            return Ok(SessionEnd::Cancelled);
        };
        let location = locations?
            .into_iter()
            .next()
            .ok_or(CoreError::NotProvisioned)?;
        info!(
            location_id = %location.id,
            name = location.attributes.name.as_deref().unwrap_or(""),
            "Using location"
        );

        self.set_phase(SessionPhase::EstablishingStream);
        let Some(url) = cancel
            .run_until_cancelled(self.client.create_websocket(&token, &location.id))
            .await
        else {
            return Ok(SessionEnd::Cancelled);
        };
        let url = url?;
        let Some(stream) = cancel
            .run_until_cancelled(PushStream::connect(
                &url,
                self.config.heartbeat,
                self.config.trace_wire,
            ))
            .await
        else {
            return Ok(SessionEnd::Cancelled);
        };
        let stream = stream?;

        self.set_phase(SessionPhase::Streaming);
        self.stream(stream, &token, cancel).await
    }

    async fn stream(
        &self,
        mut stream: PushStream,
        token: &AccessToken,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, CoreError> {
        let mut assembler = EventAssembler::new();
        let renew_at = renewal_deadline(token, self.config.renewal_margin);

        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => Step::Cancel,
                () = sleep_until(renew_at) => Step::Renew,
                frame = stream.next_frame() => Step::Frame(frame),
            };

            match step {
                Step::Frame(Ok(Some(frame))) => self.feed(&mut assembler, &frame),
                Step::Frame(Ok(None)) => return Ok(SessionEnd::Closed),
                Step::Frame(Err(e)) => return Err(e.into()),
                Step::Renew => {
                    info!("Token close to expiry, renewing session");
                    stream.close().await;
                    return Ok(SessionEnd::Renewal);
                }
                Step::Cancel => {
                    stream.close().await;
                    return Ok(SessionEnd::Cancelled);
                }
            }
        }
    }

    fn feed(&self, assembler: &mut EventAssembler, frame: &str) {
        match assembler.ingest(frame) {
            Outcome::ServiceId(id) => self.session.set_service_id(id),
            Outcome::Publish => {
                self.snapshots.send_replace(Some(assembler.snapshot().clone()));
            }
            Outcome::Nothing => {}
        }
    }

    fn set_phase(&self, next: SessionPhase) {
        let previous = self.phase.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "Session phase changed");
        }
    }
}

/// When to end a session so the next one re-authenticates in time.
/// Tokens too short-lived for the margin are ridden until the server
/// drops the stream.
fn renewal_deadline(token: &AccessToken, margin: Duration) -> Option<Instant> {
    let remaining = token.remaining();
    (remaining > margin.saturating_mul(2)).then(|| Instant::now() + (remaining - margin))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
