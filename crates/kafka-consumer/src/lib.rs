//! Clickstream consumer for the event router.
//!
//! [`Consumer`] subscribes a consumer group to the ingestion topics, races
//! shutdown signals against the client's event stream, acknowledges
//! rebalances and fans messages out to a [`MessageHandler`] through a bounded
//! worker pool.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kafka_consumer::{Consumer, ConsumerOptions, KafkaConnector, MessageHandler};
//! use router_config::ConsumerSettings;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Print;
//!
//! #[async_trait::async_trait]
//! impl MessageHandler for Print {
//!     async fn handle_message(
//!         &self,
//!         value: Vec<u8>,
//!         _key: Vec<u8>,
//!         _cancel: CancellationToken,
//!     ) -> anyhow::Result<()> {
//!         println!("{}", String::from_utf8_lossy(&value));
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let options = ConsumerOptions {
//!     settings: ConsumerSettings::new("localhost:9092", "event-router", vec!["clicks".into()]),
//!     message_handler: Arc::new(Print),
//! };
//! let logger = router_logging::noop();
//! let consumer = Consumer::new(options, KafkaConnector::new(logger.clone()))?.with_logger(logger);
//! let summary = consumer.run().await?;
//! println!("stopped: {}", summary.stop_reason);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use router_config::ConsumerSettings;
use tracing::instrument::WithSubscriber;
use tracing::{debug, dispatcher, error, info, info_span, warn, Dispatch, Instrument};

mod client;
mod dispatch;
mod error;
mod handler;
mod kafka;
mod metrics;
mod signal;

pub use client::{ClientEvent, Connector, ConsumerClient, Message, TopicPartition};
pub use dispatch::DrainOutcome;
pub use error::{ClientError, ConsumerError, Result};
pub use handler::MessageHandler;
pub use kafka::{KafkaClient, KafkaConnector};
pub use metrics::{MetricsSink, NoopMetrics, OtelMetrics};
pub use signal::ShutdownSignal;

use dispatch::WorkerPool;

pub struct ConsumerOptions {
    pub settings: ConsumerSettings,
    pub message_handler: Arc<dyn MessageHandler>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A process signal, by name.
    Signal(&'static str),
    /// The caller's shutdown future resolved.
    Shutdown,
    /// The client's event stream ended.
    StreamClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Signal(name) => write!(f, "signal {name}"),
            StopReason::Shutdown => f.write_str("shutdown request"),
            StopReason::StreamClosed => f.write_str("end of event stream"),
        }
    }
}

/// Why and how a completed run stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    /// Messages handed to the worker pool.
    pub messages_dispatched: u64,
    pub drain: DrainOutcome,
}

pub struct Consumer<C: Connector> {
    options: ConsumerOptions,
    connector: C,
    metrics: Arc<dyn MetricsSink>,
    logger: Dispatch,
}

impl<C: Connector> Consumer<C> {
    /// Nothing connects until [`Consumer::run`]. Fails only when the dispatch
    /// settings cannot back a worker pool.
    pub fn new(options: ConsumerOptions, connector: C) -> Result<Self> {
        dispatch::validate(&options.settings.dispatch)?;

        Ok(Consumer {
            options,
            connector,
            metrics: Arc::new(NoopMetrics),
            logger: Dispatch::none(),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Every log line of the run, including the dispatch workers', goes to
    /// `logger`.
    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = logger;
        self
    }

    pub fn topics(&self) -> &[String] {
        &self.options.settings.topics
    }

    /// Consumes until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<RunSummary> {
        let signal = match ShutdownSignal::register() {
            Ok(signal) => signal,
            Err(e) => {
                dispatcher::with_default(&self.logger, || {
                    error!("Failed to register signal handlers: {e}")
                });
                return Err(ConsumerError::Signal(e));
            }
        };

        self.run_until(async move { StopReason::Signal(signal.recv().await) })
            .await
    }

    /// Consumes until `shutdown` resolves, the event stream ends, or setup
    /// fails. Setup failures are returned before any event is read.
    pub async fn run_until<F>(self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = StopReason> + Send,
    {
        let logger = self.logger.clone();
        let span = dispatcher::with_default(&logger, || {
            info_span!(
                "consumer",
                package = "clickstream",
                group_id = %self.options.settings.group_id
            )
        });

        self.event_loop(shutdown)
            .instrument(span)
            .with_subscriber(logger)
            .await
    }

    async fn event_loop<F>(self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = StopReason> + Send,
    {
        let Consumer {
            options,
            connector,
            metrics,
            ..
        } = self;
        let ConsumerOptions {
            settings,
            message_handler,
        } = options;

        info!("Starting Kafka Consumer");
        debug!(
            bootstrap_servers = %settings.bootstrap_servers,
            group_id = %settings.group_id,
            topics = ?settings.topics,
            "Consumer Options"
        );

        let mut client = connector.connect(&settings).map_err(|e| {
            error!("Failed to create Kafka consumer: {e}");
            ConsumerError::Connect(e)
        })?;

        if let Err(e) = client.subscribe(&settings.topics) {
            error!(topics = ?settings.topics, "Failed to subscribe: {e}");
            client.close();
            return Err(ConsumerError::Subscribe {
                topics: settings.topics,
                source: e,
            });
        }
        info!(topics = ?settings.topics, "Subscribed");

        let pool = WorkerPool::start(&settings.dispatch, message_handler, Arc::clone(&metrics));
        let mut messages_dispatched = 0_u64;
        tokio::pin!(shutdown);

        let stop_reason = 'events: loop {
            tokio::select! {
                reason = &mut shutdown => {
                    info!("Consumer caught {reason}: terminating");
                    break 'events reason;
                }
                event = client.next_event() => {
                    let Some(event) = event else {
                        warn!("Kafka event stream ended: terminating");
                        break 'events StopReason::StreamClosed;
                    };

                    match event {
                        ClientEvent::Assigned(partitions) => {
                            info!("Assigning partitions {}", join(&partitions));
                            if let Err(e) = client.assign(&partitions) {
                                error!("Failed to acknowledge assignment: {e}");
                            }
                        }
                        ClientEvent::Revoked(partitions) => {
                            info!("Revoking partitions {}", join(&partitions));
                            if let Err(e) = client.unassign(&partitions) {
                                error!("Failed to acknowledge revocation: {e}");
                            }
                        }
                        ClientEvent::Message(message) => {
                            metrics.message_consumed();
                            // A full queue parks the loop here; shutdown still wins.
                            tokio::select! {
                                submitted = pool.submit(message) => match submitted {
                                    Ok(()) => messages_dispatched += 1,
                                    Err(e) => error!("Dropping message: {e}"),
                                },
                                reason = &mut shutdown => {
                                    info!("Consumer caught {reason} while dispatch was blocked: terminating");
                                    break 'events reason;
                                }
                            }
                        }
                        ClientEvent::PartitionEof(partition) => {
                            info!("Reached end of partition {partition}");
                        }
                        ClientEvent::Error(e) => {
                            error!("Kafka client error: {e}");
                        }
                    }
                }
            }
        };

        let drain = pool.shutdown().await;
        client.close();
        info!(
            messages_dispatched,
            ?drain,
            "Consumer Closed"
        );

        Ok(RunSummary {
            stop_reason,
            messages_dispatched,
            drain,
        })
    }
}

fn join(partitions: &[TopicPartition]) -> String {
    partitions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
