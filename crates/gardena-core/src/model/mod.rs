// ── Domain model ──
//
// Closed code sets with their normalizer, and the device snapshot the
// assembler maintains.

pub mod codes;
pub mod snapshot;

pub use codes::{
    BatteryState, CodeTable, MowerActivity, MowerError, Normalized, UNKNOWN_CODE, normalize,
};
pub use snapshot::{DeviceSnapshot, UNKNOWN_NUMBER, UNKNOWN_TEXT};
