use std::time::Duration;

use crate::{
    RouterConfig, BOOTSTRAP_SERVERS, DISPATCH_CONCURRENCY, DISPATCH_QUEUE_CAPACITY,
    KAFKA_GROUP_ID, KAFKA_INGESTION_TOPIC, KAFKA_PARTITION_EOF, SHUTDOWN_DRAIN_TIMEOUT_MS,
};

/// Everything the clickstream consumer needs to connect and dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Comma-separated broker addresses.
    pub bootstrap_servers: String,
    pub group_id: String,
    pub topics: Vec<String>,
    /// Surface end-of-partition events from the client.
    pub partition_eof: bool,
    pub dispatch: DispatchSettings,
}

/// Bounds on message handler fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Number of handler invocations that may run at once.
    pub concurrency: usize,
    /// Messages buffered ahead of the workers before the run loop waits.
    pub queue_capacity: usize,
    /// How long shutdown waits for outstanding handlers, and again for
    /// cancelled ones to return.
    pub drain_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        DispatchSettings {
            concurrency: 16,
            queue_capacity: 256,
            drain_timeout: Duration::from_millis(5000),
        }
    }
}

impl ConsumerSettings {
    pub fn new(
        bootstrap_servers: impl Into<String>,
        group_id: impl Into<String>,
        topics: Vec<String>,
    ) -> Self {
        ConsumerSettings {
            bootstrap_servers: bootstrap_servers.into(),
            group_id: group_id.into(),
            topics,
            partition_eof: false,
            dispatch: DispatchSettings::default(),
        }
    }
}

impl RouterConfig {
    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            bootstrap_servers: self.get_string(BOOTSTRAP_SERVERS).trim().to_string(),
            group_id: self.get_string(KAFKA_GROUP_ID).trim().to_string(),
            topics: split_topics(&self.get_string(KAFKA_INGESTION_TOPIC)),
            partition_eof: self.get_bool(KAFKA_PARTITION_EOF),
            dispatch: DispatchSettings {
                concurrency: to_usize(self.get_int(DISPATCH_CONCURRENCY)),
                queue_capacity: to_usize(self.get_int(DISPATCH_QUEUE_CAPACITY)),
                drain_timeout: Duration::from_millis(
                    u64::try_from(self.get_int(SHUTDOWN_DRAIN_TIMEOUT_MS)).unwrap_or(0),
                ),
            },
        }
    }
}

pub(crate) fn split_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(String::from)
        .collect()
}

// Negative values collapse to zero, which the consumer rejects at construction.
fn to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}
