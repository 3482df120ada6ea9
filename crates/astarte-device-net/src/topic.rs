//! Topic layout: `<realm>/<device_id>` base topic plus the data, control,
//! and empty-cache subtrees hung off it (§6).

/// Payload published to `<base>/control/emptyCache` during handshake.
pub const EMPTY_CACHE_PAYLOAD: &[u8] = b"1";

/// Parsed destination of an outbound or inbound data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTopic {
    pub interface: String,
    pub path: String,
}

/// What an inbound publish's topic resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTopic {
    EmptyCacheAck,
    ConsumerProperties,
    Data(DataTopic),
    /// Anything else under `<base>/control/...` that we don't recognize.
    OtherControl,
}

/// Builds topics under a device's base topic (`<realm>/<device_id>`).
#[derive(Debug, Clone)]
pub struct TopicBuilder {
    base: String,
}

impl TopicBuilder {
    pub fn new(realm: &str, device_id: &str) -> Self {
        TopicBuilder {
            base: format!("{realm}/{device_id}"),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn data(&self, interface: &str, path: &str) -> String {
        format!("{}/{interface}{path}", self.base)
    }

    pub fn empty_cache(&self) -> String {
        format!("{}/control/emptyCache", self.base)
    }

    pub fn consumer_properties(&self) -> String {
        format!("{}/control/consumer/properties", self.base)
    }

    pub fn control_wildcard(&self) -> String {
        format!("{}/control/#", self.base)
    }

    /// Wildcard subscription for one server-owned interface's subtree.
    pub fn interface_wildcard(&self, interface: &str) -> String {
        format!("{}/{interface}/#", self.base)
    }

    /// Classify an inbound publish topic relative to this device's base.
    pub fn parse(&self, topic: &str) -> Option<ParsedTopic> {
        let suffix = topic.strip_prefix(&self.base)?.strip_prefix('/')?;
        if let Some(rest) = suffix.strip_prefix("control/") {
            return Some(match rest {
                "emptyCache" => ParsedTopic::EmptyCacheAck,
                "consumer/properties" => ParsedTopic::ConsumerProperties,
                _ => ParsedTopic::OtherControl,
            });
        }
        let (interface, path) = suffix.split_once('/')?;
        Some(ParsedTopic::Data(DataTopic {
            interface: interface.to_string(),
            path: format!("/{path}"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_topic() {
        let tb = TopicBuilder::new("realm", "devId");
        let parsed = tb.parse("realm/devId/org.example.Sensors/temperature").unwrap();
        assert_eq!(
            parsed,
            ParsedTopic::Data(DataTopic {
                interface: "org.example.Sensors".into(),
                path: "/temperature".into(),
            })
        );
    }

    #[test]
    fn recognizes_control_topics() {
        let tb = TopicBuilder::new("realm", "devId");
        assert_eq!(
            tb.parse("realm/devId/control/emptyCache"),
            Some(ParsedTopic::EmptyCacheAck)
        );
        assert_eq!(
            tb.parse("realm/devId/control/consumer/properties"),
            Some(ParsedTopic::ConsumerProperties)
        );
    }

    #[test]
    fn builds_expected_topics() {
        let tb = TopicBuilder::new("realm", "devId");
        assert_eq!(tb.data("org.ex.Cfg", "/alpha"), "realm/devId/org.ex.Cfg/alpha");
        assert_eq!(tb.empty_cache(), "realm/devId/control/emptyCache");
    }
}
