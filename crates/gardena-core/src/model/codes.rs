// ── Closed code sets and their normalizer ──
//
// The push stream reports activity, battery state, and error codes as
// free-form upper-case strings. Each kind is a closed enum plus a table
// mapping wire codes to members; `normalize` is the single total lookup.

use std::fmt;

use strum::AsRefStr;

/// Wire code that explicitly means "unknown" for every kind.
pub const UNKNOWN_CODE: &str = "UNKNOWN";

/// Published name of the unknown member.
pub const UNKNOWN_NAME: &str = "unknown";

/// A closed set of known codes.
///
/// `AsRef<str>` yields the published (snake-case) name of a member.
pub trait CodeTable: Copy + PartialEq + AsRef<str> + 'static {
    /// Human-readable kind, used in anomaly logs.
    const KIND: &'static str;
    /// Wire code to member.
    const CODES: &'static [(&'static str, Self)];
}

// ── Normalized value ─────────────────────────────────────────────────

/// A code coerced into its closed set.
///
/// `Unknown` keeps the offending raw string for diagnostics only; it is
/// never published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized<T> {
    Known(T),
    Unknown(Option<String>),
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self::Unknown(None)
    }
}

impl<T: CodeTable> Normalized<T> {
    /// Name published on the bus.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Known(code) => known_name(*code),
            Self::Unknown(_) => UNKNOWN_NAME,
        }
    }

    pub fn known(&self) -> Option<T> {
        match self {
            Self::Known(code) => Some(*code),
            Self::Unknown(_) => None,
        }
    }

    /// The unrecognized wire code, if any.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Known(_) => None,
            Self::Unknown(raw) => raw.as_deref(),
        }
    }
}

impl<T: CodeTable> fmt::Display for Normalized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn known_name<T: CodeTable>(code: T) -> &'static str {
    T::CODES
        .iter()
        .find(|(_, member)| *member == code)
        .map_or(UNKNOWN_NAME, |(_, member)| member.as_ref())
}

/// Map a raw wire code into its closed set.
///
/// Returns `ok = false` when the code is not in the table; the caller
/// logs the anomaly and keeps going. The literal `UNKNOWN` is a valid
/// code and yields the unknown member with `ok = true`.
pub fn normalize<T: CodeTable>(raw: &str) -> (Normalized<T>, bool) {
    if raw == UNKNOWN_CODE {
        return (Normalized::Unknown(None), true);
    }
    match T::CODES.iter().find(|(code, _)| *code == raw) {
        Some((_, member)) => (Normalized::Known(*member), true),
        None => (Normalized::Unknown(Some(raw.to_owned())), false),
    }
}

// ── Mower activity ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MowerActivity {
    #[strum(serialize = "none")]
    Idle,
    Charging,
    Leaving,
    Cutting,
    Searching,
    ParkedTimer,
    ParkedAutoTimer,
    ParkedParkSelected,
    /// Mowing outside the schedule after a start command.
    CuttingExtra,
    Paused,
}

impl CodeTable for MowerActivity {
    const KIND: &'static str = "activity";
    const CODES: &'static [(&'static str, Self)] = &[
        ("NONE", Self::Idle),
        ("OK_CHARGING", Self::Charging),
        ("OK_LEAVING", Self::Leaving),
        ("OK_CUTTING", Self::Cutting),
        ("OK_SEARCHING", Self::Searching),
        ("PARKED_TIMER", Self::ParkedTimer),
        ("PARKED_AUTOTIMER", Self::ParkedAutoTimer),
        ("PARKED_PARK_SELECTED", Self::ParkedParkSelected),
        ("OK_CUTTING_TIMER_OVERRIDDEN", Self::CuttingExtra),
        ("PAUSED", Self::Paused),
    ];
}

// ── Mower error ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MowerError {
    NoError,
    NoMessage,
    HatchOpen,
    NoLoopSignal,
    OffHatchClosed,
    Lifted,
}

impl CodeTable for MowerError {
    const KIND: &'static str = "error code";
    const CODES: &'static [(&'static str, Self)] = &[
        ("NO_ERROR", Self::NoError),
        ("NO_MESSAGE", Self::NoMessage),
        ("OFF_HATCH_OPEN", Self::HatchOpen),
        ("NO_LOOP_SIGNAL", Self::NoLoopSignal),
        ("OFF_HATCH_CLOSED", Self::OffHatchClosed),
        ("LIFTED", Self::Lifted),
    ];
}

// ── Battery state ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum BatteryState {
    Charging,
    Ok,
}

impl CodeTable for BatteryState {
    const KIND: &'static str = "battery state";
    const CODES: &'static [(&'static str, Self)] =
        &[("CHARGING", Self::Charging), ("OK", Self::Ok)];
}
