use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsumerError>;

/// Errors raised by a [`ConsumerClient`](crate::ConsumerClient) implementation.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("{0}")]
    Other(String),
}

/// Errors that stop the consumer before or instead of running its loop.
///
/// Causes are carried as sources rather than repeated in the message.
#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("invalid dispatch settings: {0}")]
    InvalidSettings(&'static str),

    #[error("failed to register signal handlers")]
    Signal(#[source] std::io::Error),

    #[error("failed to create Kafka consumer")]
    Connect(#[source] ClientError),

    #[error("failed to subscribe to topics {topics:?}")]
    Subscribe {
        topics: Vec<String>,
        #[source]
        source: ClientError,
    },

    #[error("dispatch queue closed")]
    DispatchClosed,
}
