use opentelemetry::metrics::{Counter, Meter};

/// Consumption counters. Calls come from the run loop and the dispatch
/// workers, so implementations must be cheap and thread safe.
pub trait MetricsSink: Send + Sync {
    /// Once per message received from the client.
    fn message_consumed(&self);

    fn handler_failed(&self) {}
}

pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn message_consumed(&self) {}
}

pub struct OtelMetrics {
    messages_consumed: Counter<u64>,
    handler_failures: Counter<u64>,
}

impl OtelMetrics {
    pub fn new(meter: &Meter) -> Self {
        OtelMetrics {
            messages_consumed: meter
                .u64_counter("event_router_messages_consumed")
                .with_description("Messages received from Kafka")
                .init(),
            handler_failures: meter
                .u64_counter("event_router_handler_failures")
                .with_description("Message handler invocations that returned an error")
                .init(),
        }
    }
}

impl MetricsSink for OtelMetrics {
    fn message_consumed(&self) {
        self.messages_consumed.add(1, &[]);
    }

    fn handler_failed(&self) {
        self.handler_failures.add(1, &[]);
    }
}
