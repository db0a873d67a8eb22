use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Bridge a Gardena smart mower's push stream onto an MQTT broker.
///
/// Credentials and broker settings come from the environment (`API_KEY`,
/// `API_SECRET`, `MQTT_BROKER`, ...) and optionally a TOML file.
#[derive(Debug, Parser)]
#[command(name = "gardena-bridge", version, about)]
pub struct Cli {
    /// Configuration file (defaults to ./gardena-bridge.toml when present)
    #[arg(short, long, env = "GARDENA_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write logs to a daily-rotated file in this directory
    #[arg(long, env = "GARDENA_BRIDGE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Default filter directive for our own crates.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
