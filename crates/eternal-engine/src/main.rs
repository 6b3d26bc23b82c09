//! Server binary for the Eternal Life simulation.
//!
//! This is the main entry point that wires together configuration, the
//! checkpoint store, the run registry, and the HTTP gateway.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `eternal-config.yaml` (or `ETERNAL_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the checkpoint store (directory-backed or in-memory)
//! 4. Create the run registry
//! 5. Optionally start one run immediately
//! 6. Serve the gateway until Ctrl-C, then stop every run

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eternal_core::checkpoint::{
    CheckpointStore, DirectoryCheckpointStore, InMemoryCheckpointStore,
};
use eternal_core::config::{CheckpointConfig, LoggingConfig, SimulationConfig};
use eternal_core::registry::{RunRegistry, StartOptions};
use eternal_observer::state::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file read when `ETERNAL_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "eternal-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the checkpoint store
/// cannot be opened, or the gateway fails to bind.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = load_config(&config_path())?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("eternal-engine starting");
    info!(
        rows = config.board.rows,
        cols = config.board.cols,
        tick_interval_ms = config.run.tick_interval_ms,
        max_steps = config.run.max_steps,
        checkpoint_interval = config.run.checkpoint_interval,
        "Configuration loaded"
    );

    // 3. Open the checkpoint store.
    let store = build_store(&config.checkpoint)?;

    // 4. Create the run registry.
    let registry = Arc::new(RunRegistry::new(&config, store));

    // 5. Autostart.
    if config.server.autostart {
        let started = registry.start(StartOptions::default()).await?;
        info!(run_id = %started.run_id, "Autostarted run");
    }

    // 6. Serve until Ctrl-C. Runs are stopped before the server drains so
    //    open state streams close and do not hold the shutdown open.
    let state = Arc::new(
        AppState::new(Arc::clone(&registry)).with_ping_interval(config.stream.ping_interval()),
    );
    let shutdown = {
        let registry = Arc::clone(&registry);
        async move {
            wait_for_ctrl_c().await;
            let stopped = registry.stop_all().await;
            info!(stopped, "Stopped active runs");
        }
    };
    eternal_observer::start_server(&config.server, state, shutdown).await?;

    let stragglers = registry.stop_all().await;
    info!(stragglers, "eternal-engine stopped");
    Ok(())
}

/// Resolve the config path from `ETERNAL_CONFIG`, falling back to
/// [`DEFAULT_CONFIG_PATH`].
fn config_path() -> PathBuf {
    std::env::var_os("ETERNAL_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load configuration, or defaults when the file does not exist.
///
/// Defaults still get environment overrides and validation.
fn load_config(path: &Path) -> Result<SimulationConfig, EngineError> {
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        Ok(SimulationConfig::parse("{}")?)
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Pick the checkpoint store: a directory when configured, memory
/// otherwise.
fn build_store(config: &CheckpointConfig) -> Result<Arc<dyn CheckpointStore>, EngineError> {
    match &config.directory {
        Some(directory) => {
            let store = DirectoryCheckpointStore::open(directory)?;
            info!(directory = %store.directory().display(), "Using directory checkpoint store");
            Ok(Arc::new(store))
        }
        None => {
            info!("Using in-memory checkpoint store");
            Ok(Arc::new(InMemoryCheckpointStore::new()))
        }
    }
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
