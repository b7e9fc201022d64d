//! Logger construction for the router.
//!
//! [`build`] returns a [`Dispatch`] that callers hand to the components that
//! log. Nothing here installs a process-wide default subscriber.

use std::str::FromStr;

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Error, Debug)]
#[error("unknown log format '{0}', expected 'text' or 'json'")]
pub struct UnknownLogFormat(String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(UnknownLogFormat(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogOutput {
    #[default]
    StdOut,
    StdErr,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingConfig {
    pub debug: bool,
    pub format: LogFormat,
    pub output: LogOutput,
}

/// Builds the application logger.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` in debug mode and
/// `info` everywhere else.
pub fn build(config: &LoggingConfig) -> Dispatch {
    let level = if config.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(level.to_string()),
    };

    let writer = match config.output {
        LogOutput::StdOut => BoxMakeWriter::new(std::io::stdout),
        LogOutput::StdErr => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    match config.format {
        LogFormat::Text => Dispatch::new(builder.finish()),
        LogFormat::Json => Dispatch::new(builder.json().finish()),
    }
}

/// A logger that drops everything.
pub fn noop() -> Dispatch {
    Dispatch::none()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tracing::Level;

    use super::*;

    fn enabled_levels(dispatch: &Dispatch) -> (bool, bool) {
        tracing::dispatcher::with_default(dispatch, || {
            (
                tracing::enabled!(Level::INFO),
                tracing::enabled!(Level::DEBUG),
            )
        })
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("logfmt".parse::<LogFormat>().is_err());
    }

    #[test]
    #[serial]
    fn test_debug_flag_sets_level() {
        std::env::remove_var("RUST_LOG");

        let info = build(&LoggingConfig::default());
        assert_eq!(enabled_levels(&info), (true, false));

        let debug = build(&LoggingConfig {
            debug: true,
            format: LogFormat::Json,
            output: LogOutput::StdErr,
        });
        assert_eq!(enabled_levels(&debug), (true, true));
    }

    #[test]
    #[serial]
    fn test_rust_log_overrides_debug_flag() {
        std::env::set_var("RUST_LOG", "warn");

        let dispatch = build(&LoggingConfig {
            debug: true,
            ..LoggingConfig::default()
        });
        assert_eq!(enabled_levels(&dispatch), (false, false));

        std::env::remove_var("RUST_LOG");
    }

    #[test]
    fn test_noop_logger_is_silent() {
        assert_eq!(enabled_levels(&noop()), (false, false));
    }
}
