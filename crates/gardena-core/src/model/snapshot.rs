// ── Device snapshot ──
//
// The current known state of one mower, built up incrementally from
// push-stream fragments. One snapshot lives per stream session.

use std::fmt;

use super::codes::{BatteryState, MowerActivity, MowerError, Normalized};

/// Default for string fields the service has not reported.
pub const UNKNOWN_TEXT: &str = "UNKNOWN";

/// Default for numeric fields the service has not reported.
pub const UNKNOWN_NUMBER: i64 = -1;

/// Mutable aggregate of one device's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    // Identity
    pub name: String,
    /// `None` until a `COMMON` fragment supplies it.
    pub serial: Option<u64>,
    pub model_type: String,

    // Operational
    pub state: String,
    pub activity: Normalized<MowerActivity>,
    /// 0-100, or -1 when unknown.
    pub battery_level: i64,
    pub battery_state: Normalized<BatteryState>,
    pub rf_link_level: i64,
    pub rf_link_state: String,
    pub operating_hours: i64,
    pub last_error_code: Normalized<MowerError>,
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self {
            name: UNKNOWN_TEXT.into(),
            serial: None,
            model_type: UNKNOWN_TEXT.into(),
            state: UNKNOWN_TEXT.into(),
            activity: Normalized::default(),
            battery_level: UNKNOWN_NUMBER,
            battery_state: Normalized::default(),
            rf_link_level: UNKNOWN_NUMBER,
            rf_link_state: UNKNOWN_TEXT.into(),
            operating_hours: UNKNOWN_NUMBER,
            last_error_code: Normalized::default(),
        }
    }
}

impl DeviceSnapshot {
    /// Whether the snapshot may be published.
    pub fn is_addressable(&self) -> bool {
        self.serial.is_some()
    }
}

/// One-line summary used in the refresh log.
impl fmt::Display for DeviceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[name: {}, model: {}, serial: ", self.name, self.model_type)?;
        match self.serial {
            Some(serial) => write!(f, "{serial}")?,
            None => f.write_str("unknown")?,
        }
        write!(
            f,
            ", activity: {}, battery state: {}, battery: {}%, rf state: {}, rf level: {}, error: {}]",
            self.activity,
            self.battery_state,
            self.battery_level,
            self.rf_link_state,
            self.rf_link_level,
            self.last_error_code,
        )
    }
}
