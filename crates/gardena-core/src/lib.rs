// gardena-core: Push-stream to MQTT bridge logic between gardena-api and the binary.

pub mod assembler;
pub mod bridge;
pub mod bus;
pub mod command;
pub mod config;
pub mod error;
pub mod fragment;
pub mod model;
pub mod session;
pub mod stream_session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use assembler::{EventAssembler, Outcome};
pub use bridge::Bridge;
pub use bus::{BusBridge, BusState, TopicScheme};
pub use command::{Accepted, CommandDispatcher, CommandRouter, MowerCommand};
pub use config::{BridgeConfig, BusConfig, BusCredentials, ReconnectPolicy, SessionConfig};
pub use error::CoreError;
pub use fragment::{Fragment, decode};
pub use session::{SessionContext, SessionState};
pub use stream_session::{SessionEnd, SessionPhase, StreamSessionManager};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BatteryState, CodeTable, DeviceSnapshot, MowerActivity, MowerError, Normalized, normalize,
};
