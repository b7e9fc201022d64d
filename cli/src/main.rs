use std::sync::Arc;

use clap::Parser;
use kafka_consumer::{Consumer, ConsumerOptions, KafkaConnector, OtelMetrics};
use router_config::{InitOptions, RouterConfig, LOG_FORMAT};
use router_logging::{LogFormat, LoggingConfig};
use tracing::{dispatcher, error, info, warn};

mod handler;
mod telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = args::Cli::parse();

    let mut logging = LoggingConfig {
        output: args.log_output.into(),
        ..LoggingConfig::default()
    };

    let opts = InitOptions {
        enable_retry: args.enable_retry,
        config_file: args.config.clone(),
    };
    let config = match RouterConfig::from_env(&opts) {
        Ok(config) => config,
        Err(e) => {
            let logger = router_logging::build(&logging);
            dispatcher::with_default(&logger, || error!("{e}"));
            std::process::exit(1);
        }
    };

    logging.debug = config.is_debug_enabled();
    let format = config.get_string(LOG_FORMAT).parse::<LogFormat>();
    logging.format = format.as_ref().copied().unwrap_or_default();
    let logger = router_logging::build(&logging);
    if let Err(e) = format {
        dispatcher::with_default(&logger, || warn!("{e}, falling back to text"));
    }

    let meter_provider = match telemetry::start(&config.metrics_settings()) {
        Ok(meter_provider) => meter_provider,
        Err(e) => {
            dispatcher::with_default(&logger, || error!("Failed to start metrics exporter: {e:#}"));
            return Err(e);
        }
    };
    let meter = opentelemetry::global::meter(telemetry::SERVICE_NAME);
    let options = ConsumerOptions {
        settings: config.consumer_settings(),
        message_handler: Arc::new(handler::ClickstreamHandler),
    };
    let consumer = Consumer::new(options, KafkaConnector::new(logger.clone()))?
        .with_metrics(Arc::new(OtelMetrics::new(&meter)))
        .with_logger(logger.clone());

    let summary = consumer.run().await?;

    // Flushing blocks on the exporter task, so keep it off the runtime workers.
    let flushed = tokio::task::spawn_blocking(move || meter_provider.shutdown()).await?;
    if let Err(e) = flushed {
        dispatcher::with_default(&logger, || warn!("Failed to flush metrics: {e}"));
    }
    dispatcher::with_default(&logger, || {
        info!(
            messages = summary.messages_dispatched,
            drain = ?summary.drain,
            "Event router stopped on {}",
            summary.stop_reason
        )
    });
    Ok(())
}
