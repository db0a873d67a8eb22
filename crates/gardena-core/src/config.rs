// ── Runtime bridge configuration ──
//
// These types describe *how* the bridge connects to the smart system and
// to the MQTT broker. They carry credentials and tuning, but never touch
// disk. `gardena-config` builds a `BridgeConfig` and hands it in.

use std::time::Duration;

use gardena_api::{Credentials, Endpoints, Heartbeat, TransportConfig};
use secrecy::SecretString;

// ── Bus ──────────────────────────────────────────────────────────────

/// Optional broker login.
#[derive(Debug, Clone)]
pub struct BusCredentials {
    pub username: String,
    pub password: SecretString,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Option<BusCredentials>,
    /// Client id presented to the broker.
    pub client_id: String,
    /// First topic segment for every published and subscribed topic.
    pub namespace: String,
    pub keep_alive: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            credentials: None,
            client_id: "gardena".into(),
            namespace: "gardena".into(),
            keep_alive: Duration::from_secs(60),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Bounded exponential backoff for the bus connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub rate: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            rate: 2,
            max_delay: Duration::from_secs(60),
            max_attempts: 12,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before backoff attempt `attempt` (1-based):
    /// `min(initial * rate^(attempt-1), max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.rate.checked_pow(attempt.saturating_sub(1));
        factor
            .and_then(|f| self.initial_delay.checked_mul(f))
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

// ── Stream session ───────────────────────────────────────────────────

/// Push-stream session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed pause between the end of one session and the next.
    pub restart_pause: Duration,
    pub heartbeat: Heartbeat,
    /// Log every push-stream frame at `info`.
    pub trace_wire: bool,
    /// End a session this long before its token expires.
    pub renewal_margin: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            restart_pause: Duration::from_secs(10),
            heartbeat: Heartbeat::default(),
            trace_wire: false,
            renewal_margin: Duration::from_secs(60),
        }
    }
}

// ── Bridge ───────────────────────────────────────────────────────────

/// Everything the bridge needs to run.
///
/// Built by the binary, passed to `Bridge` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub transport: TransportConfig,
    pub session: SessionConfig,
    pub bus: BusConfig,
}

impl BridgeConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoints: Endpoints::default(),
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
            bus: BusConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=9).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60, 60]);
    }

    #[test]
    fn backoff_never_overflows() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(200), Duration::from_secs(60));
    }

    #[test]
    fn backoff_with_unit_rate_is_constant() {
        let policy = ReconnectPolicy {
            rate: 1,
            ..ReconnectPolicy::default()
        };
        assert_eq!(policy.delay_for(5), Duration::from_secs(1));
    }
}
