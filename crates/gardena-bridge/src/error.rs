//! Binary error type with miette diagnostics.
//!
//! Only startup problems surface here. Once the bridge is running, both
//! connection loops recover on their own and never end the process.

use miette::Diagnostic;
use thiserror::Error;

use gardena_config::ConfigError;
use gardena_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const STARTUP: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum BridgeError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("{key} is not set")]
    #[diagnostic(
        code(gardena::missing_setting),
        help(
            "Export {key} in the environment or add it (lower-case) to the config file.\n\
             API_KEY and API_SECRET come from the application registered on the developer portal."
        )
    )]
    MissingSetting { key: &'static str },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(gardena::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(gardena::no_config),
        help("Pass an existing file with --config, or omit it to rely on the environment.")
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(gardena::config))]
    Config(Box<figment::Error>),

    // ── Startup ──────────────────────────────────────────────────────

    #[error("Bridge failed to start: {message}")]
    #[diagnostic(
        code(gardena::startup),
        help("Check the CA_CERT path and that the configured hosts are reachable URLs.")
    )]
    Startup { message: String },

    #[error("Could not install the shutdown signal handler")]
    #[diagnostic(code(gardena::signal))]
    Signal(#[source] std::io::Error),

    #[error("Could not set up logging: {message}")]
    #[diagnostic(code(gardena::logging))]
    Logging { message: String },
}

impl BridgeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingSetting { .. }
            | Self::Validation { .. }
            | Self::NoConfig { .. }
            | Self::Config(_) => exit_code::CONFIG,
            Self::Startup { .. } => exit_code::STARTUP,
            Self::Signal(_) | Self::Logging { .. } => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingCredential { key } => Self::MissingSetting { key },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::MissingFile(path) => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Figment(err) => Self::Config(err),
        }
    }
}

impl From<CoreError> for BridgeError {
    fn from(err: CoreError) -> Self {
        Self::Startup {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_config_exit_code() {
        let err = BridgeError::from(ConfigError::MissingCredential { key: "API_KEY" });
        assert!(matches!(err, BridgeError::MissingSetting { key: "API_KEY" }));
        assert_eq!(err.exit_code(), exit_code::CONFIG);

        let err = BridgeError::from(ConfigError::MissingFile("x.toml".into()));
        assert_eq!(err.exit_code(), exit_code::CONFIG);
    }

    #[test]
    fn core_errors_map_to_startup() {
        let err = BridgeError::from(CoreError::Internal("bridge already started".into()));
        assert_eq!(err.exit_code(), exit_code::STARTUP);
        assert!(err.to_string().contains("already started"));
    }
}
