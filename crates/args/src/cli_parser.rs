use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Routes clickstream events from Kafka. Settings come from `ER_*`
/// environment variables.
#[derive(Parser, Debug)]
#[command(name = "event-router")]
#[command(author)]
#[command(version)]
#[command(about, long_about = None)]
pub struct Cli {
    #[clap(value_enum, default_value_t=LogOutput::StdOut)]
    #[arg(short, long)]
    pub log_output: LogOutput,
    /// YAML or JSON file layered under the environment.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Require the retry topic and bucket settings.
    #[arg(long)]
    pub enable_retry: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogOutput {
    StdOut,
    StdErr,
}

impl From<LogOutput> for router_logging::LogOutput {
    fn from(output: LogOutput) -> Self {
        match output {
            LogOutput::StdOut => router_logging::LogOutput::StdOut,
            LogOutput::StdErr => router_logging::LogOutput::StdErr,
        }
    }
}
