//! mos-rater - MOS listening test service
//!
//! Serves a web UI that plays each audio file of the catalog in order,
//! collects a 1-5 rating per file and reports the Mean Opinion Score.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mos_common::catalog::ensure_audio_folder;
use mos_common::config::{load_config_file, AppConfig, ConfigOverrides, StoreKind, SummaryMode};
use mos_rater::store::open_store;
use mos_rater::{build_router, AppState, RatingOrchestrator};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mos-rater
#[derive(Parser, Debug)]
#[command(name = "mos-rater")]
#[command(about = "Mean Opinion Score listening test service")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/mos-rater/config.toml)
    #[arg(short, long, env = "MOS_CONFIG")]
    config: Option<PathBuf>,

    /// Folder with the .wav/.mp3/.ogg files to rate
    #[arg(short, long, env = "MOS_AUDIO_FOLDER")]
    audio_folder: Option<PathBuf>,

    /// Folder for local ratings and the summary artifact
    #[arg(short, long, env = "MOS_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Listen address
    #[arg(short, long, env = "MOS_BIND")]
    bind: Option<String>,

    /// eager or lazy
    #[arg(long, env = "MOS_SUMMARY_MODE")]
    summary_mode: Option<SummaryMode>,

    /// memory, csv, sqlite, supabase or sheets
    #[arg(long, env = "MOS_STORE")]
    store: Option<StoreKind>,

    /// Timeout for every store request, in seconds
    #[arg(long, env = "MOS_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "MOS_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            audio_folder: self.audio_folder.clone(),
            data_folder: self.data_folder.clone(),
            bind: self.bind.clone(),
            summary_mode: self.summary_mode,
            request_timeout_secs: self.request_timeout_secs,
            store: self.store,
            log_level: self.log_level.clone(),
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("mos_rater={0},mos_common={0},tower_http={0}", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Resolve before tracing starts so the configured level applies.
    let resolved = load_config_file(args.config.as_deref())
        .and_then(|file| AppConfig::resolve(args.overrides(), file));
    let level = match &resolved {
        Ok(cfg) => cfg.log_level.clone(),
        Err(_) => args.log_level.clone().unwrap_or_else(|| "info".to_string()),
    };
    init_tracing(&level);

    info!("Starting mos-rater v{}", env!("CARGO_PKG_VERSION"));

    let config = match resolved {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    ensure_audio_folder(&config.audio_folder)
        .with_context(|| format!("Audio folder {}", config.audio_folder.display()))?;
    info!("Audio folder: {}", config.audio_folder.display());
    if let Err(e) = mos_common::catalog::list_audio_files(&config.audio_folder) {
        warn!("{}", e);
    }

    let store = open_store(&config.store, config.request_timeout)
        .await
        .context("Failed to open rating store")?;
    info!(
        "Store backend: {}, summary mode: {:?}",
        store.backend_name(),
        config.summary_mode
    );

    let orchestrator = RatingOrchestrator::from_config(&config, store);
    let app = build_router(AppState::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("mos-rater listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
