use std::time::Duration;

use crate::{RouterConfig, METRICS_EXPORT_INTERVAL_MS, METRICS_OTLP_ENDPOINT};

/// Where and how often consumption counters are pushed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricsSettings {
    /// OTLP gRPC collector, e.g. `http://otel-collector:4317`.
    pub otlp_endpoint: String,
    pub export_interval: Duration,
}

impl RouterConfig {
    pub fn metrics_settings(&self) -> MetricsSettings {
        let interval_ms = u64::try_from(self.get_int(METRICS_EXPORT_INTERVAL_MS)).unwrap_or(0);
        MetricsSettings {
            otlp_endpoint: self.get_string(METRICS_OTLP_ENDPOINT).trim().to_string(),
            // A zero period would spin the exporter.
            export_interval: Duration::from_millis(interval_ms.max(1000)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    use super::*;
    use crate::InitOptions;

    const VARS: &[&str] = &[
        "ER_BOOTSTRAP_SERVERS",
        "ER_KAFKA_GROUP_ID",
        "ER_KAFKA_INGESTION_TOPIC",
        "ER_METRICS_OTLP_ENDPOINT",
        "ER_METRICS_EXPORT_INTERVAL_MS",
    ];

    fn load() -> MetricsSettings {
        std::env::set_var("ER_BOOTSTRAP_SERVERS", "broker:9092");
        std::env::set_var("ER_KAFKA_GROUP_ID", "g1");
        std::env::set_var("ER_KAFKA_INGESTION_TOPIC", "clicks");
        RouterConfig::from_env(&InitOptions::default())
            .unwrap()
            .metrics_settings()
    }

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_metrics_defaults() {
        clear_env();

        assert_eq!(
            load(),
            MetricsSettings {
                otlp_endpoint: "http://localhost:4317".to_string(),
                export_interval: Duration::from_secs(60),
            }
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_metrics_overrides() {
        clear_env();
        std::env::set_var("ER_METRICS_OTLP_ENDPOINT", "http://otel-collector:4317");
        std::env::set_var("ER_METRICS_EXPORT_INTERVAL_MS", "10");

        assert_eq!(
            load(),
            MetricsSettings {
                otlp_endpoint: "http://otel-collector:4317".to_string(),
                export_interval: Duration::from_secs(1),
            }
        );

        clear_env();
    }
}
