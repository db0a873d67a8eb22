//! Configuration for gardena-bridge.
//!
//! Built-in defaults, an optional TOML file, and the process environment
//! are merged through `figment` (later sources win), validated, and
//! translated into `gardena_core::BridgeConfig`. Secrets are moved into
//! `SecretString` as soon as they leave the raw settings.
//!
//! Environment keys are the upper-case field names (`API_KEY`,
//! `MQTT_BROKER`, ...); the TOML file uses the same names in lower case.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

use gardena_api::{Credentials, Endpoints, Heartbeat, TlsMode, TransportConfig};
use gardena_api::client::{DEFAULT_AUTH_HOST, DEFAULT_SMART_HOST};
use gardena_core::{
    BridgeConfig, BusConfig, BusCredentials, ReconnectPolicy, SessionConfig,
};

/// Config file read when no path is given, relative to the working
/// directory. A missing default file is not an error.
pub const DEFAULT_CONFIG_FILE: &str = "gardena-bridge.toml";

/// Environment variables that feed the configuration.
pub const ENV_KEYS: &[&str] = &[
    "API_KEY",
    "API_SECRET",
    "AUTH_HOST",
    "SMART_HOST",
    "CA_CERT",
    "REQUEST_TIMEOUT_SECS",
    "MQTT_BROKER",
    "MQTT_PORT",
    "MQTT_USERNAME",
    "MQTT_PASSWORD",
    "MQTT_CLIENT_ID",
    "MQTT_KEEP_ALIVE_SECS",
    "TOPIC_NAMESPACE",
    "RECONNECT_INITIAL_SECS",
    "RECONNECT_RATE",
    "RECONNECT_MAX_SECS",
    "RECONNECT_MAX_ATTEMPTS",
    "TRACE_WEBSOCKET",
    "SESSION_RESTART_SECS",
    "PING_INTERVAL_SECS",
    "PING_TIMEOUT_SECS",
    "TOKEN_RENEWAL_MARGIN_SECS",
];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{key} is not set")]
    MissingCredential { key: &'static str },

    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Raw, merged settings before validation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    // Smart system
    /// Application key (plaintext here, `SecretString` after translation).
    #[serde(default, deserialize_with = "text")]
    pub api_key: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub api_secret: Option<String>,
    pub auth_host: String,
    pub smart_host: String,
    /// Extra CA certificate (PEM) for both HTTPS hosts.
    pub ca_cert: Option<PathBuf>,
    pub request_timeout_secs: u64,

    // Broker
    #[serde(default, deserialize_with = "text")]
    pub mqtt_broker: Option<String>,
    pub mqtt_port: u16,
    #[serde(default, deserialize_with = "text")]
    pub mqtt_username: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    pub mqtt_keep_alive_secs: u64,
    pub topic_namespace: String,
    pub reconnect_initial_secs: u64,
    pub reconnect_rate: u32,
    pub reconnect_max_secs: u64,
    pub reconnect_max_attempts: u32,

    // Stream session
    #[serde(deserialize_with = "flag")]
    pub trace_websocket: bool,
    pub session_restart_secs: u64,
    pub ping_interval_secs: u64,
    pub ping_timeout_secs: u64,
    pub token_renewal_margin_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let bus = BusConfig::default();
        let session = SessionConfig::default();
        let transport = TransportConfig::default();

        Self {
            api_key: None,
            api_secret: None,
            auth_host: DEFAULT_AUTH_HOST.into(),
            smart_host: DEFAULT_SMART_HOST.into(),
            ca_cert: None,
            request_timeout_secs: transport.timeout.as_secs(),
            mqtt_broker: None,
            mqtt_port: bus.port,
            mqtt_username: None,
            mqtt_password: None,
            mqtt_client_id: bus.client_id,
            mqtt_keep_alive_secs: bus.keep_alive.as_secs(),
            topic_namespace: bus.namespace,
            reconnect_initial_secs: bus.reconnect.initial_delay.as_secs(),
            reconnect_rate: bus.reconnect.rate,
            reconnect_max_secs: bus.reconnect.max_delay.as_secs(),
            reconnect_max_attempts: bus.reconnect.max_attempts,
            trace_websocket: session.trace_wire,
            session_restart_secs: session.restart_pause.as_secs(),
            ping_interval_secs: session.heartbeat.interval.as_secs(),
            ping_timeout_secs: session.heartbeat.timeout.as_secs(),
            token_renewal_margin_secs: session.renewal_margin.as_secs(),
        }
    }
}

/// Environment values are typed by their content, so a numeric password
/// arrives as a number. Take it back as text.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        UInt(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::UInt(u) => u.to_string(),
        Raw::Float(f) => f.to_string(),
        Raw::Bool(b) => b.to_string(),
    }))
}

/// Accept `true`/`false`, `0`/`1`, and the usual yes/no spellings.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Int(i) => Ok(i != 0),
        Raw::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" | "y" | "t" => Ok(true),
            "0" | "false" | "no" | "off" | "n" | "f" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got '{other}'"
            ))),
        },
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// The provider chain: defaults, then the TOML file, then environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::raw().only(ENV_KEYS))
}

/// Load settings from `path` (which must exist) or from
/// [`DEFAULT_CONFIG_FILE`] if present.
pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => return Err(ConfigError::MissingFile(p.to_path_buf())),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };
    Ok(figment(&path).extract()?)
}

/// Load, validate, and translate in one step.
pub fn load_bridge_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    load(path)?.to_bridge_config()
}

// ── Translation ─────────────────────────────────────────────────────

impl Settings {
    /// Validate and build the runtime configuration.
    pub fn to_bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        Ok(BridgeConfig {
            credentials: self.credentials()?,
            endpoints: self.endpoints()?,
            transport: self.transport()?,
            session: self.session()?,
            bus: self.bus()?,
        })
    }

    fn credentials(&self) -> Result<Credentials, ConfigError> {
        Ok(Credentials {
            api_key: required_secret(self.api_key.as_ref(), "API_KEY")?,
            api_secret: required_secret(self.api_secret.as_ref(), "API_SECRET")?,
        })
    }

    fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Ok(Endpoints {
            auth_host: parse_host("auth_host", &self.auth_host)?,
            smart_host: parse_host("smart_host", &self.smart_host)?,
        })
    }

    fn transport(&self) -> Result<TransportConfig, ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be at least 1"));
        }
        Ok(TransportConfig {
            tls: self
                .ca_cert
                .clone()
                .map_or(TlsMode::System, TlsMode::CustomCa),
            timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    fn session(&self) -> Result<SessionConfig, ConfigError> {
        if self.ping_interval_secs == 0 {
            return Err(invalid("ping_interval_secs", "must be at least 1"));
        }
        if self.ping_timeout_secs == 0 {
            return Err(invalid("ping_timeout_secs", "must be at least 1"));
        }
        Ok(SessionConfig {
            restart_pause: Duration::from_secs(self.session_restart_secs),
            heartbeat: Heartbeat {
                interval: Duration::from_secs(self.ping_interval_secs),
                timeout: Duration::from_secs(self.ping_timeout_secs),
            },
            trace_wire: self.trace_websocket,
            renewal_margin: Duration::from_secs(self.token_renewal_margin_secs),
        })
    }

    fn bus(&self) -> Result<BusConfig, ConfigError> {
        let host = self
            .mqtt_broker
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingCredential { key: "MQTT_BROKER" })?;

        let credentials = match (&self.mqtt_username, &self.mqtt_password) {
            (Some(username), Some(password)) => Some(BusCredentials {
                username: username.clone(),
                password: SecretString::from(password.clone()),
            }),
            (None, None) => None,
            _ => {
                return Err(invalid(
                    "mqtt_username/mqtt_password",
                    "set both or neither",
                ));
            }
        };

        let namespace = self.topic_namespace.trim();
        if namespace.is_empty() || namespace.contains(['/', '+', '#']) {
            return Err(invalid(
                "topic_namespace",
                format!("'{namespace}' must be a single topic level without wildcards"),
            ));
        }
        if self.mqtt_keep_alive_secs < 5 {
            return Err(invalid("mqtt_keep_alive_secs", "must be at least 5"));
        }
        if self.reconnect_rate == 0 {
            return Err(invalid("reconnect_rate", "must be at least 1"));
        }

        Ok(BusConfig {
            host: host.to_owned(),
            port: self.mqtt_port,
            credentials,
            client_id: self.mqtt_client_id.clone(),
            namespace: namespace.to_owned(),
            keep_alive: Duration::from_secs(self.mqtt_keep_alive_secs),
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_secs(self.reconnect_initial_secs),
                rate: self.reconnect_rate,
                max_delay: Duration::from_secs(self.reconnect_max_secs),
                max_attempts: self.reconnect_max_attempts,
            },
        })
    }
}

fn required_secret(
    value: Option<&String>,
    key: &'static str,
) -> Result<SecretString, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| SecretString::from(v.clone()))
        .ok_or(ConfigError::MissingCredential { key })
}

fn parse_host(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| invalid(field, format!("'{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(field, format!("'{raw}' is not an http(s) URL")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn base_env(jail: &mut Jail) {
        jail.set_env("API_KEY", "key-123");
        jail.set_env("API_SECRET", "secret-456");
        jail.set_env("MQTT_BROKER", "broker.local");
    }

    #[test]
    fn defaults_match_runtime_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.mqtt_port, 1883);
        assert_eq!(settings.mqtt_client_id, "gardena");
        assert_eq!(settings.topic_namespace, "gardena");
        assert_eq!(settings.reconnect_max_attempts, 12);
        assert_eq!(settings.session_restart_secs, 10);
        assert_eq!(settings.ping_interval_secs, 150);
        assert!(!settings.trace_websocket);
    }

    #[test]
    fn env_only_configuration() {
        Jail::expect_with(|jail| {
            base_env(jail);
            jail.set_env("MQTT_PORT", "8883");
            jail.set_env("TRACE_WEBSOCKET", "1");

            let config = load_bridge_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config.credentials.api_key.expose_secret(), "key-123");
            assert_eq!(config.bus.host, "broker.local");
            assert_eq!(config.bus.port, 8883);
            assert!(config.bus.credentials.is_none());
            assert!(config.session.trace_wire);
            assert_eq!(config.endpoints, Endpoints::production());
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                    api_key = "from-file"
                    api_secret = "file-secret"
                    mqtt_broker = "file-broker"
                    topic_namespace = "garden"
                    session_restart_secs = 30
                "#,
            )?;
            jail.set_env("API_KEY", "from-env");

            let config = load_bridge_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config.credentials.api_key.expose_secret(), "from-env");
            assert_eq!(config.credentials.api_secret.expose_secret(), "file-secret");
            assert_eq!(config.bus.namespace, "garden");
            assert_eq!(config.session.restart_pause, Duration::from_secs(30));
            Ok(())
        });
    }

    #[test]
    fn explicit_file_must_exist() {
        Jail::expect_with(|_jail| {
            let result = load(Some(Path::new("nope.toml")));
            assert!(matches!(result, Err(ConfigError::MissingFile(_))));
            Ok(())
        });
    }

    #[test]
    fn missing_secret_is_reported() {
        Jail::expect_with(|jail| {
            jail.set_env("API_KEY", "key");
            jail.set_env("MQTT_BROKER", "broker");

            let result = load_bridge_config(None);
            assert!(matches!(
                result,
                Err(ConfigError::MissingCredential { key: "API_SECRET" })
            ));
            Ok(())
        });
    }

    #[test]
    fn broker_is_required() {
        Jail::expect_with(|jail| {
            jail.set_env("API_KEY", "key");
            jail.set_env("API_SECRET", "secret");

            let result = load_bridge_config(None);
            assert!(matches!(
                result,
                Err(ConfigError::MissingCredential { key: "MQTT_BROKER" })
            ));
            Ok(())
        });
    }

    #[test]
    fn broker_login_needs_both_halves() {
        Jail::expect_with(|jail| {
            base_env(jail);
            jail.set_env("MQTT_USERNAME", "bridge");

            let result = load_bridge_config(None);
            assert!(matches!(result, Err(ConfigError::Validation { .. })));

            jail.set_env("MQTT_PASSWORD", "hunter2");
            let config = load_bridge_config(None).map_err(|e| e.to_string())?;
            let creds = config.bus.credentials.ok_or("credentials expected")?;
            assert_eq!(creds.username, "bridge");
            assert_eq!(creds.password.expose_secret(), "hunter2");
            Ok(())
        });
    }

    #[test]
    fn hosts_must_be_urls() {
        Jail::expect_with(|jail| {
            base_env(jail);
            jail.set_env("SMART_HOST", "not a url");

            let result = load_bridge_config(None);
            assert!(matches!(
                result,
                Err(ConfigError::Validation { ref field, .. }) if field == "smart_host"
            ));
            Ok(())
        });
    }

    #[test]
    fn namespace_cannot_nest() {
        Jail::expect_with(|jail| {
            base_env(jail);
            jail.set_env("TOPIC_NAMESPACE", "home/garden");

            assert!(matches!(
                load_bridge_config(None),
                Err(ConfigError::Validation { .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn numeric_password_stays_text() {
        Jail::expect_with(|jail| {
            base_env(jail);
            jail.set_env("MQTT_USERNAME", "bridge");
            jail.set_env("MQTT_PASSWORD", "123456");

            let config = load_bridge_config(None).map_err(|e| e.to_string())?;
            let creds = config.bus.credentials.ok_or("credentials expected")?;
            assert_eq!(creds.password.expose_secret(), "123456");
            Ok(())
        });
    }

    #[test]
    fn trace_flag_spellings() {
        Jail::expect_with(|jail| {
            for (raw, expected) in [("true", true), ("yes", true), ("0", false), ("off", false)] {
                jail.set_env("TRACE_WEBSOCKET", raw);
                let settings = load(None).map_err(|e| e.to_string())?;
                assert_eq!(settings.trace_websocket, expected, "{raw}");
            }

            jail.set_env("TRACE_WEBSOCKET", "maybe");
            assert!(load(None).is_err());
            Ok(())
        });
    }
}
