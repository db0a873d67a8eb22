// ── Event assembler ──
//
// Folds push-stream fragments into a `DeviceSnapshot` one at a time and
// extracts the mower's command service id. Never fails: malformed input
// is logged and skipped.

use tracing::{debug, info, warn};

use crate::fragment::{self, CommonAttributes, Fragment, MOWER_SERVICE, MowerAttributes};
use crate::model::{CodeTable, DeviceSnapshot, Normalized, normalize};

/// What the caller should do after a fragment was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The mower's command service id was (re-)extracted.
    ServiceId(String),
    /// The snapshot changed and its serial is known.
    Publish,
    Nothing,
}

/// Per-session fragment state machine.
#[derive(Debug, Default)]
pub struct EventAssembler {
    snapshot: DeviceSnapshot,
    service_id: Option<String>,
}

impl EventAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &DeviceSnapshot {
        &self.snapshot
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    /// Decode and apply one raw frame.
    pub fn ingest(&mut self, raw: &str) -> Outcome {
        match fragment::decode(raw) {
            Ok(fragment) => self.apply(fragment),
            Err(e) => {
                warn!(error = %e, "Dropping unreadable push frame");
                Outcome::Nothing
            }
        }
    }

    pub fn apply(&mut self, fragment: Fragment) -> Outcome {
        match fragment {
            Fragment::Device { services } => {
                let Some(service) = services.into_iter().find(|s| s.kind == MOWER_SERVICE) else {
                    debug!("Device fragment without a mower service");
                    return Outcome::Nothing;
                };
                debug!(service_id = %service.id, "Mower service id");
                self.service_id = Some(service.id.clone());
                Outcome::ServiceId(service.id)
            }
            Fragment::Common(attrs) => {
                self.apply_common(attrs);
                self.publish_if_addressable()
            }
            Fragment::Mower(attrs) => {
                self.apply_mower(attrs);
                self.publish_if_addressable()
            }
            Fragment::Location => Outcome::Nothing,
            Fragment::Unknown { kind } => {
                warn!(kind = %kind, "Unhandled push fragment");
                Outcome::Nothing
            }
        }
    }

    fn apply_common(&mut self, attrs: CommonAttributes) {
        let snap = &mut self.snapshot;
        snap.name = attrs.name;
        snap.model_type = attrs.model_type;
        snap.battery_level = attrs.battery_level;
        snap.battery_state = coerce(&attrs.battery_state);
        snap.rf_link_level = attrs.rf_link_level;
        snap.rf_link_state = attrs.rf_link_state;

        match (snap.serial, attrs.serial) {
            (None, Some(serial)) => {
                info!(serial, "Device serial learned");
                snap.serial = Some(serial);
            }
            (Some(current), Some(reported)) if current != reported => {
                warn!(current, reported, "Ignoring serial change within a session");
            }
            _ => {}
        }
    }

    fn apply_mower(&mut self, attrs: MowerAttributes) {
        let snap = &mut self.snapshot;
        snap.state = attrs.state;
        snap.operating_hours = attrs.operating_hours;
        snap.activity = coerce(&attrs.activity);
        snap.last_error_code = coerce(&attrs.last_error_code);
    }

    fn publish_if_addressable(&self) -> Outcome {
        info!("{}", self.snapshot);
        if self.snapshot.is_addressable() {
            Outcome::Publish
        } else {
            Outcome::Nothing
        }
    }
}

fn coerce<T: CodeTable>(raw: &str) -> Normalized<T> {
    let (value, ok) = normalize::<T>(raw);
    if !ok {
        warn!(kind = T::KIND, code = raw, "Unrecognized code, publishing as unknown");
    }
    value
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{BatteryState, MowerActivity, MowerError};

    const COMMON: &str = r#"{"type": "COMMON", "attributes": {
        "name": {"value": "Sileno"},
        "serial": {"value": 4711},
        "batteryLevel": {"value": 55},
        "batteryState": {"value": "CHARGING"}
    }}"#;

    const MOWER: &str = r#"{"type": "MOWER", "attributes": {
        "state": {"value": "OK"},
        "operatingHours": {"value": 321},
        "activity": {"value": "OK_CUTTING_TIMER_OVERRIDDEN"},
        "lastErrorCode": {"value": "NO_MESSAGE"}
    }}"#;

    #[test]
    fn mower_before_serial_does_not_publish() {
        let mut asm = EventAssembler::new();
        assert_eq!(asm.ingest(MOWER), Outcome::Nothing);
        assert_eq!(asm.snapshot().operating_hours, 321);
        assert_eq!(
            asm.snapshot().activity,
            Normalized::Known(MowerActivity::CuttingExtra)
        );
    }

    #[test]
    fn common_with_serial_publishes() {
        let mut asm = EventAssembler::new();
        assert_eq!(asm.ingest(COMMON), Outcome::Publish);

        let snap = asm.snapshot();
        assert_eq!(snap.serial, Some(4711));
        assert_eq!(snap.battery_level, 55);
        assert_eq!(snap.battery_state.known(), Some(BatteryState::Charging));
        assert_eq!(snap.rf_link_level, -1);

        assert_eq!(asm.ingest(MOWER), Outcome::Publish);
        assert_eq!(
            asm.snapshot().last_error_code.known(),
            Some(MowerError::NoMessage)
        );
    }

    #[test]
    fn missing_fields_overwrite_with_defaults() {
        let mut asm = EventAssembler::new();
        asm.ingest(COMMON);
        asm.ingest(r#"{"type": "COMMON", "attributes": {}}"#);

        let snap = asm.snapshot();
        assert_eq!(snap.name, "UNKNOWN");
        assert_eq!(snap.battery_level, -1);
        // serial stays once learned
        assert_eq!(snap.serial, Some(4711));
    }

    #[test]
    fn serial_is_set_once() {
        let mut asm = EventAssembler::new();
        asm.ingest(COMMON);
        asm.ingest(r#"{"type": "COMMON", "attributes": {"serial": {"value": 9999}}}"#);
        assert_eq!(asm.snapshot().serial, Some(4711));
    }

    #[test]
    fn unknown_codes_never_leak() {
        let mut asm = EventAssembler::new();
        asm.ingest(r#"{"type": "MOWER", "attributes": {"activity": {"value": "OK_DANCING"}}}"#);
        assert_eq!(asm.snapshot().activity.name(), "unknown");
        assert_eq!(asm.snapshot().activity.raw(), Some("OK_DANCING"));
    }

    #[test]
    fn first_mower_service_wins() {
        let mut asm = EventAssembler::new();
        let outcome = asm.ingest(
            r#"{"type": "DEVICE", "relationships": {"services": {"data": [
                {"type": "VALVE", "id": "svc-1"},
                {"type": "MOWER", "id": "svc-42"},
                {"type": "MOWER", "id": "svc-43"}
            ]}}}"#,
        );
        assert_eq!(outcome, Outcome::ServiceId("svc-42".into()));
        assert_eq!(asm.service_id(), Some("svc-42"));
    }

    #[test]
    fn garbage_is_ignored() {
        let mut asm = EventAssembler::new();
        assert_eq!(asm.ingest("}{"), Outcome::Nothing);
        assert_eq!(asm.ingest(r#"{"type": "LOCATION"}"#), Outcome::Nothing);
        assert_eq!(asm.ingest(r#"{"type": "SENSOR"}"#), Outcome::Nothing);
        assert_eq!(asm.snapshot(), &DeviceSnapshot::default());
    }
}
