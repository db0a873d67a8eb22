// gardena-api: Async Rust client for the Gardena smart system (REST + push stream)

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod stream;
pub mod transport;

pub use auth::AccessToken;
pub use client::{Credentials, Endpoints, SmartClient};
pub use error::Error;
pub use models::{Location, MowerControl, MowerControlCommand};
pub use stream::{Heartbeat, PushStream};
pub use transport::{TlsMode, TransportConfig};
