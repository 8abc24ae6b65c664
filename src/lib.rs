// Core services for a local-first developer toolbox

// Module declarations
pub mod codec;
pub mod commands;
pub mod config;
pub mod detect;
pub mod export;
pub mod storage;
pub mod worker;

use std::path::Path;

use commands::AppState;
use storage::{get_default_data_dir, StorageResult};
use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber. `RUST_LOG` wins over `default_level`.
/// Later calls are no-ops.
pub fn init_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        // Fall back to `default_level` if RUST_LOG is unset or invalid
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Open every store, seeding default settings on first run.
///
/// `data_dir` defaults to the platform data directory.
pub fn bootstrap(data_dir: Option<&Path>) -> StorageResult<AppState> {
    let dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_default_data_dir()?,
    };
    tracing::info!(data_dir = %dir.display(), "opening toolbox databases");

    let state = AppState::open(&dir)?;

    if let Ok(history) = state.history.lock() {
        match history.count() {
            Ok(count) => tracing::info!(count, "history entries on disk"),
            Err(e) => tracing::warn!(error = %e, "could not count history entries"),
        }
    }
    if let Ok(snippets) = state.snippets.list() {
        tracing::info!(count = snippets.len(), "snippets on disk");
    }

    Ok(state)
}
