//! Schema-tolerant decoding of push-stream fragments.
//!
//! Every text frame on the push stream is one JSON object tagged by
//! `type`. Attribute values are nested as `{"<name>": {"value": ...}}`
//! and any of them may be absent or of an unexpected JSON type. This
//! module turns a raw frame into a typed [`Fragment`] and is the only
//! place where defaults are substituted: numbers fall back to `-1`,
//! strings to `"UNKNOWN"`.
//!
//! # Example
//!
//! ```rust,ignore
//! use gardena_core::fragment::{Fragment, decode};
//!
//! match decode(frame)? {
//!     Fragment::Mower(attrs) => println!("{}", attrs.activity),
//!     other => println!("{}", other.kind()),
//! }
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{UNKNOWN_NUMBER, UNKNOWN_TEXT};

/// Service type that accepts mower commands.
pub const MOWER_SERVICE: &str = "MOWER";

/// A frame that could not be read as a fragment at all.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,
}

// ── Fragment ─────────────────────────────────────────────────────────

/// One decoded push-stream unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Device { services: Vec<ServiceRef> },
    Common(CommonAttributes),
    Mower(MowerAttributes),
    Location,
    /// Anything else, including `COMMON`/`MOWER` frames without an
    /// attribute object.
    Unknown { kind: String },
}

impl Fragment {
    /// The wire `type` tag this fragment was decoded from.
    pub fn kind(&self) -> &str {
        match self {
            Self::Device { .. } => "DEVICE",
            Self::Common(_) => "COMMON",
            Self::Mower(_) => "MOWER",
            Self::Location => "LOCATION",
            Self::Unknown { kind } => kind,
        }
    }
}

/// Entry of a device's `relationships.services.data` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub kind: String,
    pub id: String,
}

/// Attributes of a `COMMON` fragment.
///
/// `battery_state` is the raw wire code; the assembler normalizes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonAttributes {
    pub name: String,
    pub serial: Option<u64>,
    pub model_type: String,
    pub battery_level: i64,
    pub battery_state: String,
    pub rf_link_level: i64,
    pub rf_link_state: String,
}

/// Attributes of a `MOWER` fragment.
///
/// `activity` and `last_error_code` are raw wire codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MowerAttributes {
    pub state: String,
    pub operating_hours: i64,
    pub activity: String,
    pub last_error_code: String,
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode one raw push-stream frame.
///
/// Only frames that are not JSON objects fail; every shape problem
/// inside an object degrades to a default or to [`Fragment::Unknown`].
pub fn decode(raw: &str) -> Result<Fragment, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(object) = value else {
        return Err(DecodeError::NotAnObject);
    };
    Ok(decode_object(&object))
}

fn decode_object(object: &Map<String, Value>) -> Fragment {
    let kind = object.get("type").and_then(Value::as_str).unwrap_or_default();
    let attributes = object.get("attributes").and_then(Value::as_object);

    match (kind, attributes) {
        ("DEVICE", _) => Fragment::Device {
            services: services(object),
        },
        ("COMMON", Some(attrs)) => Fragment::Common(CommonAttributes {
            name: text(attrs, "name"),
            serial: serial(attrs),
            model_type: text(attrs, "modelType"),
            battery_level: number(attrs, "batteryLevel"),
            battery_state: text(attrs, "batteryState"),
            rf_link_level: number(attrs, "rfLinkLevel"),
            rf_link_state: text(attrs, "rfLinkState"),
        }),
        ("MOWER", Some(attrs)) => Fragment::Mower(MowerAttributes {
            state: text(attrs, "state"),
            operating_hours: number(attrs, "operatingHours"),
            activity: text(attrs, "activity"),
            last_error_code: text(attrs, "lastErrorCode"),
        }),
        ("LOCATION", _) => Fragment::Location,
        (other, _) => Fragment::Unknown {
            kind: if other.is_empty() {
                "<untyped>".to_owned()
            } else {
                other.to_owned()
            },
        },
    }
}

fn services(object: &Map<String, Value>) -> Vec<ServiceRef> {
    object
        .get("relationships")
        .and_then(|r| r.get("services"))
        .and_then(|s| s.get("data"))
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let kind = entry.get("type")?.as_str()?;
                    let id = entry.get("id")?.as_str()?;
                    Some(ServiceRef {
                        kind: kind.to_owned(),
                        id: id.to_owned(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `attributes.<name>.value`, if present and not null.
fn attribute<'a>(attrs: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    attrs
        .get(name)
        .and_then(|a| a.get("value"))
        .filter(|v| !v.is_null())
}

fn text(attrs: &Map<String, Value>, name: &str) -> String {
    match attribute(attrs, name) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => UNKNOWN_TEXT.to_owned(),
    }
}

fn number(attrs: &Map<String, Value>, name: &str) -> i64 {
    match attribute(attrs, name) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or(UNKNOWN_NUMBER)
}

fn serial(attrs: &Map<String, Value>) -> Option<u64> {
    u64::try_from(number(attrs, "serial")).ok()
}
