pub mod backend;
pub mod config;
pub mod errors;
pub mod filters;
pub mod models;
pub mod preferences;
pub mod store;
pub mod validation;

pub use crate::backend::{
    AlwaysFail, AlwaysSucceed, Latency, LeadSource, Operation, Outcome, OutcomeStrategy, RandomOutcome,
    ScriptedOutcome, SimulatedBackend,
};
pub use crate::config::StoreConfig;
pub use crate::errors::{to_client_error, AppError, AppResult};
pub use crate::models::{
    DashboardView, Lead, LeadFilters, LeadPatch, LoadState, Opportunity, OpportunityStage, SortKey, SortOrder,
    StoreEvent,
};
pub use crate::preferences::PreferenceStore;
pub use crate::store::{LeadStore, UpdateTicket};

use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Builds the store described by `config` and starts the initial lead load.
///
/// A failed load is not returned as an error: it is recorded in the store and shows
/// up in `DashboardView::error`, the same way a renderer would see it.
pub async fn open_dashboard(config: &StoreConfig) -> AppResult<LeadStore> {
    if let Err(error) = init_tracing(config) {
        eprintln!("failed to initialize logging: {}", error);
    }

    let store = LeadStore::from_config(config)?;
    if let Err(error) = store.load().await {
        tracing::warn!(error = %error, "startup lead load failed");
    }
    Ok(store)
}

/// Installs the JSON file subscriber under the configured log directory.
/// Returns `false` without touching the global subscriber when no directory resolves.
pub fn init_tracing(config: &StoreConfig) -> AppResult<bool> {
    let Some(log_dir) = config.resolved_log_dir() else {
        return Ok(false);
    };
    std::fs::create_dir_all(&log_dir)?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "lead-desk.log"));
    if LOG_GUARD.set(guard).is_err() {
        // A subscriber from an earlier call already owns the log file.
        return Ok(true);
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(writer)
        .try_init()
        .map_err(|error| AppError::Internal(format!("tracing init failed: {}", error)))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::{init_tracing, StoreConfig};

    #[test]
    fn in_memory_config_skips_file_logging() {
        let installed = init_tracing(&StoreConfig::default()).expect("init tracing");
        assert!(!installed);
    }
}
