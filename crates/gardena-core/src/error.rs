// ── Core error types ──
//
// Bridge-level errors from gardena-core. Consumers see what went wrong
// with the session or the bus, not raw transport details. The
// `From<gardena_api::Error>` impl folds service failures into these.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("No location is provisioned for this application")]
    NotProvisioned,

    #[error("No valid session token")]
    NotAuthenticated,

    #[error("Push stream failed: {reason}")]
    StreamFailed { reason: String },

    #[error("Cannot reach {service}: {reason}")]
    ConnectionFailed { service: &'static str, reason: String },

    // ── Command errors ───────────────────────────────────────────────
    #[error("No mower service id is known yet")]
    MissingServiceId,

    #[error("{operation} rejected (HTTP {status}): {message}")]
    Rejected {
        operation: String,
        status: u16,
        message: String,
    },

    // ── Bus errors ───────────────────────────────────────────────────
    #[error("MQTT error: {message}")]
    Bus { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<gardena_api::Error> for CoreError {
    fn from(err: gardena_api::Error) -> Self {
        match err {
            gardena_api::Error::Authentication { status, body } => {
                CoreError::AuthenticationFailed {
                    message: format!("HTTP {status}: {body}"),
                }
            }
            gardena_api::Error::InvalidCredential(message) => {
                CoreError::AuthenticationFailed { message }
            }
            gardena_api::Error::Rejected {
                operation,
                status,
                body,
            } => CoreError::Rejected {
                operation: operation.to_owned(),
                status,
                message: body,
            },
            gardena_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                service: "smart system API",
                reason: e.to_string(),
            },
            gardena_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            gardena_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                service: "smart system API",
                reason: format!("TLS error: {msg}"),
            },
            gardena_api::Error::WebSocketConnect(reason) => CoreError::StreamFailed { reason },
            gardena_api::Error::PingTimeout { timeout_ms } => CoreError::StreamFailed {
                reason: format!("no pong within {timeout_ms}ms"),
            },
            gardena_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

impl From<rumqttc::ClientError> for CoreError {
    fn from(err: rumqttc::ClientError) -> Self {
        CoreError::Bus {
            message: err.to_string(),
        }
    }
}
