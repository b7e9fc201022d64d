use rdkafka::ClientConfig;

use crate::ConsumerSettings;

pub const SESSION_TIMEOUT_MS: u32 = 6000;

impl From<&ConsumerSettings> for ClientConfig {
    /// Fixed client policy: offsets are committed automatically on the
    /// client's interval and reset to the earliest offset when the group has
    /// none. Rebalances are acknowledged by the application.
    fn from(settings: &ConsumerSettings) -> Self {
        let mut client_config = ClientConfig::new();

        client_config
            .set("bootstrap.servers", &settings.bootstrap_servers)
            .set("group.id", &settings.group_id)
            .set("session.timeout.ms", SESSION_TIMEOUT_MS.to_string())
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", settings.partition_eof.to_string());

        client_config
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rdkafka::ClientConfig;

    use crate::ConsumerSettings;

    #[test]
    fn test_client_policy() {
        let settings = ConsumerSettings::new("broker:9092", "g1", vec!["clicks".to_string()]);
        let client: ClientConfig = (&settings).into();

        assert_eq!(client.get("bootstrap.servers"), Some("broker:9092"));
        assert_eq!(client.get("group.id"), Some("g1"));
        assert_eq!(client.get("session.timeout.ms"), Some("6000"));
        assert_eq!(client.get("enable.auto.commit"), Some("true"));
        assert_eq!(client.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(client.get("enable.partition.eof"), Some("false"));
    }
}
