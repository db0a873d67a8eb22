//! `gardena-bridge`: relays a Gardena smart mower onto MQTT.
//!
//! Loads the configuration, installs tracing, starts the
//! [`Bridge`](gardena_core::Bridge), and runs until Ctrl-C or SIGTERM.
//! Both connection loops recover on their own; only startup problems end
//! the process with a non-zero exit code.

mod cli;
mod error;

use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use gardena_core::Bridge;

use crate::cli::{Cli, LogFormat};
use crate::error::BridgeError;

const LOG_FILE_PREFIX: &str = "gardena-bridge.log";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), BridgeError> {
    let config = gardena_config::load_bridge_config(cli.config.as_deref())?;
    let _guard = init_tracing(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        broker = %config.bus.host,
        smart_host = %config.endpoints.smart_host,
        "gardena-bridge starting"
    );

    let bridge = Bridge::new(config)?;
    bridge.start().await?;

    let signal = shutdown_signal().await;
    info!("Shutting down");
    bridge.shutdown().await;
    signal
}

/// Console layer plus an optional daily-rotated file layer. The returned
/// guard flushes the file writer on drop.
fn init_tracing(cli: &Cli) -> Result<Option<WorkerGuard>, BridgeError> {
    let level = cli.log_level();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,gardena_api={level},gardena_core={level},gardena_bridge={level}"
        ))
    });

    let console = match cli.log_format {
        LogFormat::Text => fmt::layer().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    let (file, guard) = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| BridgeError::Logging {
            message: e.to_string(),
        })?;

    Ok(guard)
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<(), BridgeError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).map_err(BridgeError::Signal)?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map_err(BridgeError::Signal),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<(), BridgeError> {
    tokio::signal::ctrl_c().await.map_err(BridgeError::Signal)
}
