//! Stream consumer binary
//!
//! Usage:
//!   stream-consumer config/consumer.conf
//!   stream-consumer --default -n 4
//!   stream-consumer config/consumer.toml --silent --json-logs

use anyhow::{Context, Result};
use clap::Parser;
use consumer::{JsonIdExtractor, Supervisor, ThroughputReporter};
use consumer_config::ConsumerConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "stream-consumer")]
#[command(about = "Consume a pub/sub channel and republish to a stream")]
#[command(version)]
struct Args {
    /// Path to configuration file (flat key=value, or TOML by extension)
    config: Option<PathBuf>,

    /// Use the built-in default configuration
    #[arg(short, long)]
    default: bool,

    /// Override the number of workers
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    number: Option<u16>,

    /// Log each processed message at debug instead of info
    #[arg(short, long)]
    silent: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    info!("Starting stream consumer");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = resolve_config(&args)?;
    info!(
        host = %config.host,
        port = config.port,
        group_size = config.group_size,
        channel = %config.subscription_channel,
        stream = %config.processing_stream,
        "Configuration loaded"
    );

    let supervisor = Supervisor::new(config, Arc::new(JsonIdExtractor)).with_silent(args.silent);
    let stop = supervisor.stop_signal();

    let reporter = ThroughputReporter::new(
        supervisor.counters(),
        supervisor.config().monitoring_interval(),
        stop.clone(),
    )
    .spawn()?;

    let mut consumer = tokio::task::spawn_blocking(move || supervisor.run());

    let outcome = tokio::select! {
        joined = &mut consumer => joined,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to install Ctrl-C handler")?;
            info!("Shutdown signal received, stopping consumer");
            stop.stop();
            consumer.await
        }
    };

    stop.stop();
    if let Some(handle) = reporter {
        if handle.join().is_err() {
            warn!("Throughput reporter panicked");
        }
    }

    match outcome.context("Consumer thread panicked")? {
        Ok(()) => {
            info!("Stream consumer stopped");
            Ok(())
        }
        Err(e) => {
            error!(category = e.category(), "Stream consumer failed: {}", e);
            Err(e.into())
        }
    }
}

/// Load the file unless told to use defaults; a bad file falls back to defaults
fn resolve_config(args: &Args) -> Result<ConsumerConfig> {
    let config = match (&args.config, args.default) {
        (Some(path), false) => ConsumerConfig::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), "Invalid configuration, using defaults: {:#}", e);
            ConsumerConfig::default()
        }),
        (_, true) => ConsumerConfig::default(),
        (None, false) => {
            info!("No configuration file given, using defaults");
            ConsumerConfig::default()
        }
    };

    let config = match args.number {
        Some(number) => config.with_group_size(usize::from(number)),
        None => config,
    };

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(args.log_level.to_lowercase()))
        .context("Invalid log level")?;

    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to initialise logging")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("Failed to initialise logging")?;
    }

    Ok(())
}
