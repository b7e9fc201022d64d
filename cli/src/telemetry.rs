use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::MeterProvider;
use opentelemetry_sdk::{runtime, Resource};
use router_config::MetricsSettings;

pub const SERVICE_NAME: &str = "event-router";

/// Starts a periodic OTLP metrics exporter and installs it as the global meter
/// provider. The collector is dialled lazily, so an unreachable endpoint only
/// shows up as failed exports.
pub fn start(settings: &MetricsSettings) -> anyhow::Result<MeterProvider> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(settings.otlp_endpoint.clone());

    let meter_provider = opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(exporter)
        .with_period(settings.export_interval)
        .with_resource(Resource::new([KeyValue::new("service.name", SERVICE_NAME)]))
        .build()?;
    opentelemetry::global::set_meter_provider(meter_provider.clone());

    Ok(meter_provider)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kafka_consumer::{MetricsSink, OtelMetrics};

    use super::*;

    fn settings(endpoint: &str) -> MetricsSettings {
        MetricsSettings {
            otlp_endpoint: endpoint.to_string(),
            export_interval: Duration::from_secs(60),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_installs_a_recording_provider() {
        let _provider = start(&settings("http://127.0.0.1:4317")).unwrap();

        let metrics = OtelMetrics::new(&opentelemetry::global::meter(SERVICE_NAME));
        metrics.message_consumed();
        metrics.handler_failed();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_endpoint_is_rejected() {
        assert!(start(&settings("not a collector")).is_err());
    }
}
