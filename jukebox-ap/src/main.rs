//! Jukebox Audio Player (jukebox-ap) - Main entry point
//!
//! Loads bootstrap configuration, starts the queue scanner, prefetcher and
//! event log, then serves the HTTP control API until Ctrl+C / SIGTERM.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use jukebox_ap::config::Config;
use jukebox_ap::event_log::EventLog;
use jukebox_ap::playback::VlcLauncher;
use jukebox_ap::resolver::YtDlpResolver;
use jukebox_ap::{api, Jukebox};
use jukebox_common::config::{load_toml, ConfigFileResolver, LoggingConfig};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for jukebox-ap
#[derive(Parser, Debug)]
#[command(name = "jukebox-ap")]
#[command(about = "Streaming jukebox queue and playback service")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "JUKEBOX_PORT")]
    port: Option<u16>,

    /// Directory for the event logs
    #[arg(long, env = "JUKEBOX_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Player executable (defaults to VLC found on PATH)
    #[arg(long, env = "JUKEBOX_PLAYER")]
    player: Option<PathBuf>,

    /// Start with clean mode enabled
    #[arg(long)]
    clean: bool,
}

impl Args {
    /// Command-line values take precedence over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = log_dir.clone();
        }
        if let Some(player) = &self.player {
            config.player.binary = Some(player.clone());
        }
        if self.clean {
            config.clean_mode = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = ConfigFileResolver::new("JUKEBOX_CONFIG")
        .resolve(args.config.as_deref())
        .context("Failed to locate config file")?;
    let mut config: Config =
        load_toml(config_path.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    init_tracing(&config.logging)?;

    // Build identification first, before anything that can stall
    info!(
        "Starting Jukebox Audio Player (jukebox-ap) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using built-in defaults"),
    }
    info!("Event log directory: {}", config.log_dir.display());

    let jukebox = Arc::new(Jukebox::new(
        &config,
        Arc::new(YtDlpResolver::new(config.resolver.clone())),
        Arc::new(VlcLauncher::new(config.player.clone())),
    ));

    let event_log = EventLog::new(&config.log_dir).spawn(jukebox.subscribe_events());
    jukebox.start();

    let served = api::run(&config, Arc::clone(&jukebox), shutdown_signal()).await;

    jukebox.shutdown().await;
    event_log.abort();

    served.context("HTTP server failed")?;
    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing: stderr always, plus an optional log file.
/// `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if logging.level.contains('=') {
            EnvFilter::new(&logging.level)
        } else {
            EnvFilter::new(format!(
                "jukebox_ap={level},jukebox_common={level},tower_http={level}",
                level = logging.level
            ))
        }
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
