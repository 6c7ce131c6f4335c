//! marker-stream - Marker pose tracking daemon
//!
//! Runs the tracking pipeline against the simulated devices and streams
//! frames plus poses over UDP:
//!
//! ```text
//! marker-stream [CONFIG] [--config PATH] [--target HOST:PORT] [--ticks N]
//! ```
//!
//! Without a configuration file every setting takes its default and the
//! stream goes to `127.0.0.1:12345`.

use clap::Parser;
use marker_stream::config::AppConfig;
use marker_stream::devices::create_simulated_devices;
use marker_stream::error::{Error, Result};
use marker_stream::transport::UdpTransport;
use marker_stream::Pipeline;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default configuration file, used when present
const DEFAULT_CONFIG: &str = "marker-stream.toml";

/// Marker pose tracking with UDP streaming
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (positional form)
    #[arg(value_name = "CONFIG")]
    config_path: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, conflicts_with = "config_path")]
    config: Option<PathBuf>,

    /// Override the stream destination (host:port)
    #[arg(short, long)]
    target: Option<String>,

    /// Stop after N ticks (runs until Ctrl-C otherwise)
    #[arg(long)]
    ticks: Option<u64>,
}

fn load_config(args: &Args) -> Result<(AppConfig, Option<PathBuf>)> {
    let explicit = args.config.clone().or_else(|| args.config_path.clone());
    let mut config = match &explicit {
        Some(path) => AppConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => AppConfig::from_file(DEFAULT_CONFIG)?,
        None => AppConfig::default(),
    };
    if let Some(target) = &args.target {
        config.streaming.target_address = target.clone();
    }
    config.validate()?;

    let source = explicit.or_else(|| {
        Path::new(DEFAULT_CONFIG)
            .exists()
            .then(|| PathBuf::from(DEFAULT_CONFIG))
    });
    Ok((config, source))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_source) = load_config(&args)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("marker-stream v{} starting...", env!("CARGO_PKG_VERSION"));
    match &config_source {
        Some(path) => log::info!("Using config: {}", path.display()),
        None => log::info!("No config file, using defaults"),
    }

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let devices = create_simulated_devices(&config)?;
    let transport = UdpTransport::open(
        &config.streaming.bind_address,
        config.streaming.target_address.as_str(),
    )?;
    let destination = transport.target();
    let mut pipeline = Pipeline::from_config(&config, devices, Box::new(transport))?;

    match pipeline.send_init_burst() {
        Ok(sent) => log::info!("INIT delivered to socket {} times", sent),
        Err(e) => log::warn!("INIT burst failed: {}", e),
    }

    log::info!(
        "Streaming {}x{} frames to {} (JPEG quality {}). Press Ctrl-C to stop.",
        config.camera.width,
        config.camera.height,
        destination,
        config.streaming.jpeg_quality
    );
    pipeline.run(&running, args.ticks)?;

    log::info!("marker-stream stopped");
    Ok(())
}
