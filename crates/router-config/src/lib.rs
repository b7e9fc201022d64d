use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use thiserror::Error;

pub mod consumer;
mod into;
pub mod metrics;

pub use consumer::{ConsumerSettings, DispatchSettings};
pub use metrics::MetricsSettings;

/// Environment variable prefix shared by every setting.
pub const PREFIX: &str = "ER";

pub const DEBUG: &str = "DEBUG";
pub const LOG_FORMAT: &str = "LOG_FORMAT";
pub const CONFIG_PATH: &str = "CONFIG_PATH";

pub const BOOTSTRAP_SERVERS: &str = "BOOTSTRAP_SERVERS";
pub const SERVE_PORT: &str = "SERVE_PORT";
pub const KAFKA_GROUP_ID: &str = "KAFKA_GROUP_ID";
pub const KAFKA_INGESTION_TOPIC: &str = "KAFKA_INGESTION_TOPIC";
pub const KAFKA_PARTITION_EOF: &str = "KAFKA_PARTITION_EOF";
pub const KAFKA_PRODUCER_FLUSH_TIMEOUT_MS: &str = "KAFKA_PRODUCER_FLUSH_TIMEOUT_MS";
pub const KAFKA_PRODUCER_MESSAGE_TIMEOUT_MS: &str = "KAFKA_PRODUCER_MESSAGE_TIMEOUT_MS";
pub const MAX_RETRIES: &str = "MAX_RETRIES";
pub const CLICKSTREAM_RETRY_TOPIC: &str = "CLICKSTREAM_RETRY_TOPIC";
pub const CLICKSTREAM_RETRY_S3_BUCKET: &str = "CLICKSTREAM_RETRY_S3_BUCKET";
pub const CLICKSTREAM_RETRY_S3_PATH_PREFIX: &str = "CLICKSTREAM_RETRY_S3_PATH_PREFIX";

pub const DISPATCH_CONCURRENCY: &str = "DISPATCH_CONCURRENCY";
pub const DISPATCH_QUEUE_CAPACITY: &str = "DISPATCH_QUEUE_CAPACITY";
pub const SHUTDOWN_DRAIN_TIMEOUT_MS: &str = "SHUTDOWN_DRAIN_TIMEOUT_MS";

pub const METRICS_OTLP_ENDPOINT: &str = "METRICS_OTLP_ENDPOINT";
pub const METRICS_EXPORT_INTERVAL_MS: &str = "METRICS_EXPORT_INTERVAL_MS";

const REQUIRED: &[&str] = &[BOOTSTRAP_SERVERS, KAFKA_GROUP_ID, KAFKA_INGESTION_TOPIC];

const RETRY_REQUIRED: &[&str] = &[CLICKSTREAM_RETRY_TOPIC, CLICKSTREAM_RETRY_S3_BUCKET];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{}", describe_missing(.0))]
    MissingRequired(Vec<String>),
    #[error("config file {} must be .yaml, .yml or .json", .0.display())]
    UnsupportedFile(PathBuf),
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

fn describe_missing(keys: &[String]) -> String {
    keys.iter()
        .map(|key| format!("{key} is required"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Debug, Default)]
pub struct InitOptions {
    /// Retry forwarding needs its topic and bucket on top of the base set.
    pub enable_retry: bool,
    /// Takes precedence over `ER_CONFIG_PATH`.
    pub config_file: Option<PathBuf>,
}

/// Resolved router settings.
///
/// Values are layered defaults, then an optional YAML/JSON file, then `ER_*`
/// environment variables. Keys are addressed by their unprefixed upper-case
/// names, e.g. [`BOOTSTRAP_SERVERS`].
#[derive(Clone, Debug)]
pub struct RouterConfig {
    settings: Config,
    debug: bool,
}

impl RouterConfig {
    pub fn from_env(opts: &InitOptions) -> Result<RouterConfig, ConfigError> {
        let mut builder = Config::builder()
            .set_default(key(DEBUG), false)?
            .set_default(key(LOG_FORMAT), "text")?
            .set_default(key(SERVE_PORT), "8080")?
            .set_default(key(KAFKA_PARTITION_EOF), false)?
            .set_default(key(KAFKA_PRODUCER_FLUSH_TIMEOUT_MS), 1000_i64)?
            .set_default(key(KAFKA_PRODUCER_MESSAGE_TIMEOUT_MS), 5000_i64)?
            .set_default(key(MAX_RETRIES), 2_i64)?
            .set_default(key(DISPATCH_CONCURRENCY), 16_i64)?
            .set_default(key(DISPATCH_QUEUE_CAPACITY), 256_i64)?
            .set_default(key(SHUTDOWN_DRAIN_TIMEOUT_MS), 5000_i64)?
            .set_default(key(METRICS_OTLP_ENDPOINT), "http://localhost:4317")?
            .set_default(key(METRICS_EXPORT_INTERVAL_MS), 60_000_i64)?;

        let path_from_env = std::env::var(format!("{PREFIX}_{CONFIG_PATH}")).ok();
        let path = opts
            .config_file
            .clone()
            .or_else(|| path_from_env.map(PathBuf::from));
        if let Some(path) = path {
            let format =
                file_format(&path).ok_or_else(|| ConfigError::UnsupportedFile(path.clone()))?;
            builder = builder.add_source(File::from(path).format(format).required(true));
        }

        builder = builder.add_source(Environment::with_prefix(PREFIX));

        let config = RouterConfig::from_settings(builder.build()?);
        config.verify_required(opts)?;
        Ok(config)
    }

    fn from_settings(settings: Config) -> RouterConfig {
        let debug = settings.get_bool(&key(DEBUG)).unwrap_or(false);
        RouterConfig { settings, debug }
    }

    fn verify_required(&self, opts: &InitOptions) -> Result<(), ConfigError> {
        let retry: &[&str] = if opts.enable_retry { RETRY_REQUIRED } else { &[] };
        let missing: Vec<String> = REQUIRED
            .iter()
            .chain(retry)
            .filter(|name| self.is_blank(name))
            .map(|name| format!("{PREFIX}_{name}"))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingRequired(missing))
        }
    }

    // A topic list of only separators names no topic.
    fn is_blank(&self, name: &str) -> bool {
        let value = self.get_string(name);
        if name == KAFKA_INGESTION_TOPIC {
            consumer::split_topics(&value).is_empty()
        } else {
            value.trim().is_empty()
        }
    }

    /// Empty when unset.
    pub fn get_string(&self, name: &str) -> String {
        self.settings.get_string(&key(name)).unwrap_or_default()
    }

    /// `false` when unset or unparsable.
    pub fn get_bool(&self, name: &str) -> bool {
        self.settings.get_bool(&key(name)).unwrap_or(false)
    }

    /// `0` when unset or unparsable.
    pub fn get_int(&self, name: &str) -> i64 {
        self.settings.get_int(&key(name)).unwrap_or(0)
    }

    pub fn is_debug_enabled(&self) -> bool {
        self.debug
    }
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

fn file_format(path: &Path) -> Option<FileFormat> {
    match path.extension()?.to_str()? {
        "yaml" | "yml" => Some(FileFormat::Yaml),
        "json" => Some(FileFormat::Json),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use serial_test::serial;

    use crate::*;

    const VARS: &[&str] = &[
        "ER_BOOTSTRAP_SERVERS",
        "ER_KAFKA_GROUP_ID",
        "ER_KAFKA_INGESTION_TOPIC",
        "ER_DEBUG",
        "ER_MAX_RETRIES",
        "ER_CLICKSTREAM_RETRY_TOPIC",
        "ER_CLICKSTREAM_RETRY_S3_BUCKET",
        "ER_CONFIG_PATH",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    fn set_required() {
        std::env::set_var("ER_BOOTSTRAP_SERVERS", "broker-1:9092,broker-2:9092");
        std::env::set_var("ER_KAFKA_GROUP_ID", "event-router");
        std::env::set_var("ER_KAFKA_INGESTION_TOPIC", "clickstream");
    }

    #[test]
    #[serial]
    fn test_defaults_apply_when_unset() {
        clear_env();
        set_required();

        let cfg = RouterConfig::from_env(&InitOptions::default()).unwrap();

        assert!(!cfg.is_debug_enabled());
        assert_eq!(cfg.get_string(SERVE_PORT), "8080");
        assert_eq!(cfg.get_string(LOG_FORMAT), "text");
        assert_eq!(cfg.get_int(KAFKA_PRODUCER_FLUSH_TIMEOUT_MS), 1000);
        assert_eq!(cfg.get_int(KAFKA_PRODUCER_MESSAGE_TIMEOUT_MS), 5000);
        assert_eq!(cfg.get_int(MAX_RETRIES), 2);
        assert_eq!(cfg.get_string(CLICKSTREAM_RETRY_S3_PATH_PREFIX), "");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_defaults() {
        clear_env();
        set_required();
        std::env::set_var("ER_DEBUG", "true");
        std::env::set_var("ER_MAX_RETRIES", "7");

        let cfg = RouterConfig::from_env(&InitOptions::default()).unwrap();

        assert!(cfg.is_debug_enabled());
        assert!(cfg.get_bool(DEBUG));
        assert_eq!(cfg.get_int(MAX_RETRIES), 7);
        assert_eq!(cfg.get_string(KAFKA_GROUP_ID), "event-router");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_every_missing_key_is_reported() {
        clear_env();
        std::env::set_var("ER_KAFKA_GROUP_ID", "event-router");

        let err = RouterConfig::from_env(&InitOptions::default()).unwrap_err();
        match &err {
            ConfigError::MissingRequired(keys) => assert_eq!(
                keys,
                &vec![
                    "ER_BOOTSTRAP_SERVERS".to_string(),
                    "ER_KAFKA_INGESTION_TOPIC".to_string()
                ]
            ),
            other => panic!("Should have been a missing key error, got {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "ER_BOOTSTRAP_SERVERS is required\nER_KAFKA_INGESTION_TOPIC is required"
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_retry_keys_required_only_with_retry_enabled() {
        clear_env();
        set_required();

        assert!(RouterConfig::from_env(&InitOptions::default()).is_ok());

        let opts = InitOptions {
            enable_retry: true,
            ..InitOptions::default()
        };
        match RouterConfig::from_env(&opts) {
            Err(ConfigError::MissingRequired(keys)) => assert_eq!(
                keys,
                vec![
                    "ER_CLICKSTREAM_RETRY_TOPIC".to_string(),
                    "ER_CLICKSTREAM_RETRY_S3_BUCKET".to_string()
                ]
            ),
            other => panic!("Should have required the retry keys, got {other:?}"),
        }

        std::env::set_var("ER_CLICKSTREAM_RETRY_TOPIC", "clickstream-retry");
        std::env::set_var("ER_CLICKSTREAM_RETRY_S3_BUCKET", "retry-bucket");
        assert!(RouterConfig::from_env(&opts).is_ok());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_file_is_layered_under_env() {
        clear_env();
        let dir = std::env::temp_dir().join(format!("router-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("router.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "bootstrap_servers: file-broker:9092").unwrap();
        writeln!(file, "kafka_group_id: file-group").unwrap();
        writeln!(file, "kafka_ingestion_topic: file-topic").unwrap();
        writeln!(file, "max_retries: 4").unwrap();
        std::env::set_var("ER_KAFKA_GROUP_ID", "env-group");

        let opts = InitOptions {
            config_file: Some(path),
            ..InitOptions::default()
        };
        let cfg = RouterConfig::from_env(&opts).unwrap();

        assert_eq!(cfg.get_string(BOOTSTRAP_SERVERS), "file-broker:9092");
        assert_eq!(cfg.get_string(KAFKA_GROUP_ID), "env-group");
        assert_eq!(cfg.get_int(MAX_RETRIES), 4);

        std::fs::remove_dir_all(dir).unwrap();
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unsupported_config_file_is_rejected() {
        clear_env();
        set_required();
        std::env::set_var("ER_CONFIG_PATH", "router.toml");

        let err = RouterConfig::from_env(&InitOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFile(_)), "{err:?}");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_blank_required_values_are_missing() {
        clear_env();
        std::env::set_var("ER_BOOTSTRAP_SERVERS", "  ");
        std::env::set_var("ER_KAFKA_GROUP_ID", "\t");
        std::env::set_var("ER_KAFKA_INGESTION_TOPIC", " , ");

        let err = RouterConfig::from_env(&InitOptions::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ER_BOOTSTRAP_SERVERS is required\n\
             ER_KAFKA_GROUP_ID is required\n\
             ER_KAFKA_INGESTION_TOPIC is required"
        );

        clear_env();
    }
}
