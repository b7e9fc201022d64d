//! [`Connector`] backed by librdkafka.

use std::collections::BTreeSet;

use async_trait::async_trait;
use rdkafka::client::ClientContext;
use rdkafka::config::{ClientConfig, RDKafkaLogLevel};
use rdkafka::consumer::stream_consumer::StreamConsumer;
use rdkafka::consumer::{Consumer, ConsumerContext, Rebalance};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::Message as _;
use rdkafka::topic_partition_list::TopicPartitionList;
use router_config::ConsumerSettings;
use tokio::sync::mpsc;
use tracing::{debug, dispatcher, error, info, warn, Dispatch};

use crate::client::{ClientEvent, Connector, ConsumerClient, Message, TopicPartition};
use crate::error::ClientError;

/// Opens [`KafkaClient`]s whose librdkafka logs and callbacks go to `logger`.
pub struct KafkaConnector {
    logger: Dispatch,
}

impl KafkaConnector {
    pub fn new(logger: Dispatch) -> Self {
        KafkaConnector { logger }
    }
}

impl Connector for KafkaConnector {
    type Client = KafkaClient;

    fn connect(&self, settings: &ConsumerSettings) -> Result<KafkaClient, ClientError> {
        let (rebalance_tx, rebalances) = mpsc::unbounded_channel();
        let context = RouterContext {
            logger: self.logger.clone(),
            rebalances: rebalance_tx,
        };

        let consumer: RouterConsumer = ClientConfig::from(settings)
            .set_log_level(RDKafkaLogLevel::Info)
            .create_with_context(context)?;

        Ok(KafkaClient {
            consumer,
            rebalances,
        })
    }
}

type RouterConsumer = StreamConsumer<RouterContext>;

pub struct KafkaClient {
    consumer: RouterConsumer,
    rebalances: mpsc::UnboundedReceiver<ClientEvent>,
}

impl KafkaClient {
    fn assigned(&self) -> Result<BTreeSet<TopicPartition>, ClientError> {
        Ok(partitions_of(&self.consumer.assignment()?).into_iter().collect())
    }

    fn reassign(&self, wanted: &BTreeSet<TopicPartition>) -> Result<(), ClientError> {
        if wanted.is_empty() {
            self.consumer.unassign()?;
        } else {
            self.consumer.assign(&to_list(wanted))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ConsumerClient for KafkaClient {
    fn subscribe(&mut self, topics: &[String]) -> Result<(), ClientError> {
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer.subscribe(&topics)?;
        Ok(())
    }

    // librdkafka has already applied the assignment by the time the
    // post-rebalance event reaches the loop, so acknowledging only touches the
    // client when its view differs from what the loop was told.
    fn assign(&mut self, partitions: &[TopicPartition]) -> Result<(), ClientError> {
        let current = self.assigned()?;
        let mut wanted = current.clone();
        wanted.extend(partitions.iter().cloned());
        if wanted != current {
            self.reassign(&wanted)?;
        }
        Ok(())
    }

    fn unassign(&mut self, partitions: &[TopicPartition]) -> Result<(), ClientError> {
        let current = self.assigned()?;
        let mut wanted = current.clone();
        for partition in partitions {
            wanted.remove(partition);
        }
        if wanted != current {
            self.reassign(&wanted)?;
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ClientEvent> {
        tokio::select! {
            Some(event) = self.rebalances.recv() => Some(event),
            received = self.consumer.recv() => Some(match received {
                Ok(m) => ClientEvent::Message(Message {
                    topic: m.topic().to_string(),
                    partition: m.partition(),
                    offset: m.offset(),
                    key: m.key().map(<[u8]>::to_vec).unwrap_or_default(),
                    value: m.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                }),
                Err(KafkaError::PartitionEOF(partition)) => ClientEvent::PartitionEof(partition),
                Err(e) => ClientEvent::Error(e.into()),
            }),
        }
    }

    fn close(self) {
        self.consumer.unsubscribe();
        // Dropping the last handle runs librdkafka's consumer close.
        drop(self.consumer);
    }
}

fn partitions_of(list: &TopicPartitionList) -> Vec<TopicPartition> {
    list.elements()
        .iter()
        .map(|elem| TopicPartition::new(elem.topic(), elem.partition()))
        .collect()
}

fn to_list<'a>(partitions: impl IntoIterator<Item = &'a TopicPartition>) -> TopicPartitionList {
    let mut list = TopicPartitionList::new();
    for tp in partitions {
        list.add_partition(&tp.topic, tp.partition);
    }
    list
}

struct RouterContext {
    logger: Dispatch,
    rebalances: mpsc::UnboundedSender<ClientEvent>,
}

impl ClientContext for RouterContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        dispatcher::with_default(&self.logger, || match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => error!(target: "librdkafka", facility = fac, "{log_message}"),
            RDKafkaLogLevel::Warning => warn!(target: "librdkafka", facility = fac, "{log_message}"),
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                info!(target: "librdkafka", facility = fac, "{log_message}")
            }
            RDKafkaLogLevel::Debug => debug!(target: "librdkafka", facility = fac, "{log_message}"),
        });
    }
}

impl ConsumerContext for RouterContext {
    fn post_rebalance(&self, rebalance: &Rebalance) {
        let event = match rebalance {
            Rebalance::Assign(list) => ClientEvent::Assigned(partitions_of(list)),
            Rebalance::Revoke(list) => ClientEvent::Revoked(partitions_of(list)),
            Rebalance::Error(e) => ClientEvent::Error(ClientError::Other(format!("rebalance failed: {e}"))),
        };
        // The receiver only goes away together with the client.
        let _ = self.rebalances.send(event);
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        dispatcher::with_default(&self.logger, || match result {
            Ok(()) => debug!("Committed offsets for {} partitions", offsets.count()),
            Err(e) => warn!("Committing offsets failed: {e}"),
        });
    }
}
