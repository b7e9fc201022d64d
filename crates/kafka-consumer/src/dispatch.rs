//! Bounded fan-out from the run loop to the message handler.

use std::sync::Arc;
use std::time::Duration;

use router_config::DispatchSettings;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::client::Message;
use crate::error::{ConsumerError, Result};
use crate::handler::MessageHandler;
use crate::metrics::MetricsSink;

/// How the drain phase of a shutdown ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every queued message was handled.
    Completed,
    /// The drain bound elapsed with `outstanding` workers still busy; their
    /// handlers were cancelled.
    Cancelled { outstanding: usize },
}

pub(crate) fn validate(settings: &DispatchSettings) -> Result<()> {
    if settings.concurrency == 0 {
        return Err(ConsumerError::InvalidSettings("concurrency must be at least 1"));
    }
    if settings.queue_capacity == 0 {
        return Err(ConsumerError::InvalidSettings("queue capacity must be at least 1"));
    }
    Ok(())
}

pub(crate) struct WorkerPool {
    sender: mpsc::Sender<Message>,
    workers: JoinSet<()>,
    cancel: CancellationToken,
    drain_timeout: Duration,
}

impl WorkerPool {
    /// Spawns the workers. Must run inside the logger the workers should use.
    pub(crate) fn start(
        settings: &DispatchSettings,
        handler: Arc<dyn MessageHandler>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let cancel = CancellationToken::new();

        let mut workers = JoinSet::new();
        for id in 0..settings.concurrency {
            let worker = Worker {
                receiver: Arc::clone(&receiver),
                handler: Arc::clone(&handler),
                metrics: Arc::clone(&metrics),
                cancel: cancel.clone(),
            };
            workers.spawn(
                worker
                    .run()
                    .instrument(info_span!("dispatch_worker", worker = id))
                    .with_current_subscriber(),
            );
        }
        debug!(workers = settings.concurrency, "Dispatch workers started");

        WorkerPool {
            sender,
            workers,
            cancel,
            drain_timeout: settings.drain_timeout,
        }
    }

    /// Queues a message, waiting while the queue is full.
    pub(crate) async fn submit(&self, message: Message) -> Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| ConsumerError::DispatchClosed)
    }

    /// Stops accepting work and waits for the workers, cancelling whatever is
    /// still running once the drain bound elapses.
    pub(crate) async fn shutdown(self) -> DrainOutcome {
        let WorkerPool {
            sender,
            mut workers,
            cancel,
            drain_timeout,
        } = self;
        drop(sender);

        if tokio::time::timeout(drain_timeout, join_all(&mut workers))
            .await
            .is_ok()
        {
            debug!("Dispatch queue drained");
            return DrainOutcome::Completed;
        }

        let outstanding = workers.len();
        warn!(
            outstanding,
            "Drain timed out after {drain_timeout:?}, cancelling in-flight handlers"
        );
        cancel.cancel();

        if tokio::time::timeout(drain_timeout, join_all(&mut workers))
            .await
            .is_err()
        {
            warn!(
                remaining = workers.len(),
                "Handlers ignored cancellation, aborting"
            );
            workers.shutdown().await;
        }

        DrainOutcome::Cancelled { outstanding }
    }
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("Dispatch worker panicked: {e}");
            }
        }
    }
}

struct Worker {
    receiver: Arc<Mutex<mpsc::Receiver<Message>>>,
    handler: Arc<dyn MessageHandler>,
    metrics: Arc<dyn MetricsSink>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        loop {
            let next = {
                let mut receiver = self.receiver.lock().await;
                // Once cancelled, queued messages are left unhandled.
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    message = receiver.recv() => message,
                }
            };
            let Some(message) = next else {
                break;
            };

            let Message {
                topic,
                partition,
                offset,
                key,
                value,
            } = message;

            if let Err(e) = self
                .handler
                .handle_message(value, key, self.cancel.child_token())
                .await
            {
                self.metrics.handler_failed();
                error!(
                    topic = %topic,
                    partition,
                    offset,
                    "Message handler failed: {e:#}"
                );
            }
        }
    }
}
