//! rawinput-replay
//!
//! Replays a JSON-lines trace of host events through the raw input filter and
//! prints the resulting device calls and statistics.

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use rawinput_bridge::config::Config;
use rawinput_bridge::replay::{parse_trace, replay};

/// Command-line arguments for rawinput-replay
#[derive(Parser, Debug)]
#[command(name = "rawinput-replay")]
#[command(version, about = "Replay raw input traces through the input filter", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "RAWINPUT_CONFIG")]
    config: Option<String>,

    /// Trace file (JSON lines)
    #[arg(short, long)]
    trace: String,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Directory for a daily log file (in addition to stderr)
    #[arg(long)]
    log_dir: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default_config()?,
    };

    let _guard = init_logging(&args, &config)?;

    info!(
        "rawinput-replay v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );
    tracing::debug!("Config: {:?}", config);

    let file = File::open(&args.trace).context(format!("Failed to open trace: {}", args.trace))?;
    let events = parse_trace(BufReader::new(file))?;
    info!("Loaded {} trace events", events.len());

    let outcome = replay(&events, config.filter_settings()?)?;

    info!(
        "Replay finished: {} consumed, {} passed, {} dropped",
        outcome.consumed,
        outcome.passed,
        outcome.stats.total_drops()
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}

fn init_logging(
    args: &Args,
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let log_format = args
        .log_format
        .as_deref()
        .unwrap_or(config.logging.format.as_str());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "rawinput_bridge={level},rawinput_replay={level},warn",
            level = log_level
        ))
    });

    // Logs go to stderr; stdout carries the replay result
    let stderr_layer = match log_format {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        "compact" => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let log_dir = args
        .log_dir
        .clone()
        .or_else(|| {
            config
                .logging
                .log_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
        });

    let (file_layer, guard) = match &log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "rawinput-replay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = &log_dir {
        info!("Logging to directory: {}", dir);
    }

    Ok(guard)
}
