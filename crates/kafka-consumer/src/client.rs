use std::fmt;

use async_trait::async_trait;
use router_config::ConsumerSettings;

use crate::error::ClientError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        TopicPartition {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.topic, self.partition)
    }
}

/// A consumed record. Missing keys and payloads are empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Everything the client pushes to the run loop through its single event
/// stream.
#[derive(Debug)]
pub enum ClientEvent {
    Assigned(Vec<TopicPartition>),
    Revoked(Vec<TopicPartition>),
    Message(Message),
    PartitionEof(i32),
    Error(ClientError),
}

/// A connected consumer client, owned by one run of the loop.
#[async_trait]
pub trait ConsumerClient: Send {
    fn subscribe(&mut self, topics: &[String]) -> Result<(), ClientError>;

    /// Acknowledges that exactly `partitions` were assigned to this member.
    fn assign(&mut self, partitions: &[TopicPartition]) -> Result<(), ClientError>;

    /// Acknowledges that exactly `partitions` were revoked from this member.
    fn unassign(&mut self, partitions: &[TopicPartition]) -> Result<(), ClientError>;

    /// Waits for the next event. `None` means the stream is gone for good.
    ///
    /// Must be cancel safe: the loop drops this future whenever shutdown wins
    /// the race.
    async fn next_event(&mut self) -> Option<ClientEvent>;

    fn close(self);
}

/// Opens client connections.
pub trait Connector: Send + Sync {
    type Client: ConsumerClient;

    fn connect(&self, settings: &ConsumerSettings) -> Result<Self::Client, ClientError>;
}
