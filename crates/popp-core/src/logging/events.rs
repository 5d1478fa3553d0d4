//! Structured event vocabulary for logging.
//!
//! Every event carries a stable name from [`event_names`], the [`Stage`]
//! it belongs to, and the run id of the invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing stages of a popp run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Restoring models from the record stores.
    Load,
    /// Feeding observations into the models.
    Learn,
    /// Rebuilding the spectral surface.
    Refresh,
    /// Reading point estimates.
    Retrieve,
    /// Persisting bucket records.
    Save,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Learn => "learn",
            Stage::Refresh => "refresh",
            Stage::Retrieve => "retrieve",
            Stage::Save => "save",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    // Load stage
    pub const LOAD_REGION_DONE: &str = "load.region_done";
    pub const LOAD_REGION_EMPTY: &str = "load.region_empty";
    pub const LOAD_REGION_FAILED: &str = "load.region_failed";

    // Learn stage
    pub const LEARN_STARTED: &str = "learn.started";
    pub const LEARN_REGION_DONE: &str = "learn.region_done";
    pub const LEARN_REGION_FAILED: &str = "learn.region_failed";
    pub const LEARN_FINISHED: &str = "learn.finished";

    // Refresh stage
    pub const REFRESH_DONE: &str = "refresh.done";

    // Retrieve stage
    pub const RETRIEVE_CYCLE: &str = "retrieve.cycle";

    // Save stage
    pub const SAVE_REGION_DONE: &str = "save.region_done";

    // Error events
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Correlation context shared by the events of one invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    /// When the invocation started.
    pub started_at: DateTime<Utc>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            started_at: Utc::now(),
        }
    }

    /// Milliseconds since the context was created.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}
