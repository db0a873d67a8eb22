// Wire shapes for the smart system REST API.
//
// The API speaks JSON:API: every payload is wrapped as
// `{ "data": { "id", "type", "attributes" } }` (or a list of those).
// Only the fields the bridge actually reads are modelled.

use serde::{Deserialize, Serialize};

/// Top-level JSON:API document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document<T> {
    pub data: T,
}

/// A resource object as returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: A,
}

/// A resource object as sent to the service.
///
/// The service ignores the client-chosen `id` but insists it is present.
#[derive(Debug, Clone, Serialize)]
pub struct NewResource<A> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attributes: A,
}

// ── Token endpoint ──────────────────────────────────────────────────

/// Body of a successful client-credentials token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

// ── Locations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationAttributes {
    #[serde(default)]
    pub name: Option<String>,
}

pub type Location = Resource<LocationAttributes>;

// ── WebSocket endpoint ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct WebSocketRequest {
    #[serde(rename = "locationId")]
    pub location_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebSocketAttributes {
    #[serde(default)]
    pub url: String,
    /// Seconds the URL stays valid for the initial connect.
    #[serde(default)]
    pub validity: Option<u64>,
}

// ── Mower control ───────────────────────────────────────────────────

/// Control verbs accepted by the `MOWER_CONTROL` command resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MowerControlCommand {
    /// Return to the station and wait for the next scheduled task.
    ParkUntilNextTask,
    /// Mow for `seconds`, overriding the schedule.
    StartSecondsToOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MowerControl {
    pub command: MowerControlCommand,
    pub seconds: u64,
}
