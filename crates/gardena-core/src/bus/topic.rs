// ── Topic layout ──
//
// `<ns>/mower/<serial>/<field>` for state, `<ns>/mower/<serial>/command`
// for inbound commands.

use thiserror::Error;

const DEVICE_SEGMENT: &str = "mower";
const COMMAND_SEGMENT: &str = "command";

/// Why an inbound topic was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("expected 4 topic segments, got {0}")]
    SegmentCount(usize),

    #[error("topic is outside namespace '{0}'")]
    Namespace(String),

    #[error("not a mower command topic")]
    NotCommand,

    #[error("invalid serial '{0}'")]
    Serial(String),
}

/// Topic construction and parsing under one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    namespace: String,
}

impl TopicScheme {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// State topic for one snapshot field.
    pub fn state(&self, serial: u64, field: &str) -> String {
        format!("{}/{DEVICE_SEGMENT}/{serial}/{field}", self.namespace)
    }

    /// Topic the bridge subscribes to for `serial`.
    pub fn command(&self, serial: u64) -> String {
        self.state(serial, COMMAND_SEGMENT)
    }

    /// Extract the serial from a command topic.
    ///
    /// Accepts exactly `<ns>/mower/<serial>/command` with an integer serial.
    pub fn parse_command(&self, topic: &str) -> Result<u64, TopicError> {
        let parts: Vec<&str> = topic.split('/').collect();
        let [ns, device, serial, command] = parts.as_slice() else {
            return Err(TopicError::SegmentCount(parts.len()));
        };
        if *ns != self.namespace {
            return Err(TopicError::Namespace(self.namespace.clone()));
        }
        if *device != DEVICE_SEGMENT || *command != COMMAND_SEGMENT {
            return Err(TopicError::NotCommand);
        }
        serial
            .parse()
            .map_err(|_| TopicError::Serial((*serial).to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> TopicScheme {
        TopicScheme::new("gardena")
    }

    #[test]
    fn builds_topics() {
        assert_eq!(scheme().state(42, "battery"), "gardena/mower/42/battery");
        assert_eq!(scheme().command(42), "gardena/mower/42/command");
    }

    #[test]
    fn parses_command_topic() {
        assert_eq!(scheme().parse_command("gardena/mower/100012345/command"), Ok(100_012_345));
    }

    #[test]
    fn rejects_wrong_shapes() {
        let s = scheme();
        assert_eq!(s.parse_command(""), Err(TopicError::SegmentCount(1)));
        assert_eq!(s.parse_command("gardena"), Err(TopicError::SegmentCount(1)));
        assert_eq!(s.parse_command("gardena/mower"), Err(TopicError::SegmentCount(2)));
        assert_eq!(
            s.parse_command("gardena/mower/42/command/x"),
            Err(TopicError::SegmentCount(5))
        );
        assert_eq!(s.parse_command("gardena/mower/42"), Err(TopicError::SegmentCount(3)));
        assert!(matches!(s.parse_command("other/mower/42/command"), Err(TopicError::Namespace(_))));
        assert_eq!(s.parse_command("gardena/valve/42/command"), Err(TopicError::NotCommand));
        assert_eq!(s.parse_command("gardena/mower/42/battery"), Err(TopicError::NotCommand));
        assert_eq!(
            s.parse_command("gardena/mower/abc/command"),
            Err(TopicError::Serial("abc".into()))
        );
        assert!(s.parse_command("gardena/mower/-1/command").is_err());
        assert!(s.parse_command("gardena/mower//command").is_err());
    }
}
