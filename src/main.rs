//! ==============================================================================
//! main.rs - kiosk host entry point
//! ==============================================================================
//!
//! purpose:
//!     runs on the kiosk device next to a full-screen browser. works out
//!     which device this is, looks its presentation up in a published csv
//!     directory and keeps the browser showing it, re-checking periodically.
//!
//! responsibilities:
//!     - load configuration (config/kiosk.toml + command line overrides)
//!     - open the local store and resolve the device identity
//!     - resolve the directory location (fixed url or session template)
//!     - run the refresh scheduler (15 min cycle by default)
//!     - serve the kiosk shell the browser displays
//!
//! relationships:
//!     - uses: config.rs, store.rs, identity.rs, location.rs, controller.rs
//!     - uses: directory.rs, render.rs, session.rs, scheduler.rs, server.rs
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                     kiosk host (this file)                   │
//!     │  ┌─────────────────┐    ┌──────────────┐   ┌──────────────┐  │
//!     │  │ refresh         │───▶│ renderer     │◀──│ web shell    │  │
//!     │  │ scheduler       │    │ (frame +     │   │ (port 3000)  │  │
//!     │  │ (15 min cycle)  │    │  indicator)  │   └──────┬───────┘  │
//!     │  └───────┬─────────┘    └──────────────┘          │          │
//!     └──────────┼────────────────────────────────────────┼──────────┘
//!                │ http get (csv)                         │ poll state,
//!                ▼                                        ▼ frame events
//!        ┌──────────────────┐                    ┌──────────────────┐
//!        │ published device │                    │ kiosk browser    │
//!        │ directory        │                    │ (iframe)         │
//!        └──────────────────┘                    └──────────────────┘
//!
//! startup failures:
//!     a missing or invalid session identifier halts startup. the shell keeps
//!     serving so the error is on screen; a valid `/?session=` from the kiosk
//!     browser resumes the kiosk without a restart.
//!
//! ==============================================================================

mod config;
mod controller;
mod directory;
mod domain;
mod error;
mod identity;
mod location;
mod render;
mod scheduler;
mod server;
mod session;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::KioskConfig;
use crate::controller::KioskController;
use crate::directory::HttpDirectoryFetcher;
use crate::identity::IdentityResolver;
use crate::location::ConfigSource;
use crate::render::Renderer;
use crate::session::KioskSession;
use crate::store::{FileStore, KeyValueStore};

#[derive(Parser, Debug)]
#[command(name = "kiosk-host", version, about = "Per-device presentation kiosk host")]
struct Cli {
    /// Path to kiosk.toml (default: config/kiosk.toml or ../config/kiosk.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session identifier substituted into the directory template
    #[arg(long)]
    session: Option<String>,

    /// Override the refresh interval
    #[arg(long)]
    interval_seconds: Option<u64>,

    /// Override the shell bind address
    #[arg(long)]
    bind: Option<String>,
}

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // startup banner
    println!("===========================================================");
    println!("  Kiosk Host - per-device presentation display");
    println!("===========================================================");

    // step 1: load configuration
    let mut config = match &cli.config {
        Some(path) => KioskConfig::load(path)?,
        None => KioskConfig::load_or_default(),
    };
    if let Some(interval) = cli.interval_seconds {
        config.polling.interval_seconds = interval;
    }
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }

    init_tracing(&config.logging.level);
    config.print_summary();

    // step 2: local store + identity source
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&config.storage.path)
            .with_context(|| format!("failed to open local store at {}", config.storage.path))?,
    );
    let source = identity::detect_source(&config.identity);
    info!(source = source.name(), "Identity source selected");
    let resolver = IdentityResolver::new(store.clone(), source, config.identity.fallback_prefix.clone());

    // step 3: session context
    let fetcher = Arc::new(HttpDirectoryFetcher::new(
        config.directory.timeout_seconds.map(Duration::from_secs),
    )?);
    let config_source = ConfigSource::from_config(&config.directory)?;
    let session = Arc::new(KioskSession::new(
        resolver,
        fetcher,
        config_source,
        store,
        Renderer::new(),
    ));
    let interval = Duration::from_secs(config.polling.interval_seconds.max(1));
    let kiosk = Arc::new(KioskController::new(session, interval));

    // step 4: start the web shell in background
    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let bind = config.server.bind.clone();
    let web_kiosk = kiosk.clone();
    let server = tokio::spawn(async move {
        let shutdown = async move {
            let _ = stop_rx.changed().await;
        };
        if let Err(e) = server::run_server(&bind, web_kiosk, shutdown).await {
            error!(error = %e, "Web server error");
        }
    });

    // step 5: identify, first cycle, then the refresh loop
    // a halted startup is already logged and on screen; the shell can resume it
    let _ = kiosk.startup(cli.session.as_deref()).await;

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!(scheduler_running = kiosk.is_running().await, "Shutting down");

    kiosk.shutdown().await;
    let _ = stop_tx.send(true);
    server.await.ok();
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
