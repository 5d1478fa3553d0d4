//! Error types for popp.
//!
//! Errors carry a stable numeric code, a category, a recoverability hint and
//! a remediation string, so the CLI can print a short human message and
//! batch callers can serialize failures per region.
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Model Store Corrupted
//!   Reason: corrupted record store at db/kitchen/poisson_process_86400/60: ...
//!   Fix: Delete the damaged record files and re-run 'popp learn'.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 51,
//!   "category": "store",
//!   "message": "corrupted record store at ...",
//!   "recoverable": true,
//!   "suggested_action": "manual_intervention",
//!   "context": { "location": "db/kitchen/poisson_process_86400/60" }
//! }
//! ```

use popp_math::spectral::SpectralError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for popp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration and region registry errors.
    Config,
    /// Rate model construction and spectral reconstruction errors.
    Model,
    /// Observation feed errors.
    Feed,
    /// Durable record store errors.
    Store,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Feed => write!(f, "feed"),
            ErrorCategory::Store => write!(f, "store"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested follow-ups for automated callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Run the config check command.
    RunCheck,
    /// Fix the input data and retry.
    FixInput,
    /// Skip this item and continue.
    Skip,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for popp.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid region id {id:?}: {reason}")]
    InvalidRegion { id: String, reason: String },

    #[error("unknown region: {region}")]
    UnknownRegion { region: String },

    // Model errors (30-39)
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("spectral reconstruction failed: {0}")]
    Spectral(#[from] SpectralError),

    // Feed errors (40-49)
    #[error("observation feed error: {0}")]
    Feed(String),

    // Store errors (50-59)
    #[error("corrupted record store at {location}: {message}")]
    StoreCorrupted { location: String, message: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 30-39: Model errors
    /// - 40-49: Feed errors
    /// - 50-59: Store errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidRegion { .. } => 11,
            Error::UnknownRegion { .. } => 12,
            Error::InvalidModel(_) => 30,
            Error::Spectral(_) => 31,
            Error::Feed(_) => 40,
            Error::StoreCorrupted { .. } => 51,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Yaml(_) => 62,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidRegion { .. } | Error::UnknownRegion { .. } => {
                ErrorCategory::Config
            }
            Error::InvalidModel(_) | Error::Spectral(_) => ErrorCategory::Model,
            Error::Feed(_) => ErrorCategory::Feed,
            Error::StoreCorrupted { .. } => ErrorCategory::Store,
            Error::Io(_) | Error::Json(_) | Error::Yaml(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::InvalidRegion { .. } => true,
            Error::UnknownRegion { .. } => false,

            // The model shape is fixed at construction
            Error::InvalidModel(_) => false,
            Error::Spectral(_) => false,

            Error::Feed(_) => true,
            Error::StoreCorrupted { .. } => true,

            Error::Io(_) => true,
            Error::Json(_) => true,
            Error::Yaml(_) => true,
        }
    }

    /// Returns the suggested action for automated callers.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) => SuggestedAction::RunCheck,
            Error::InvalidRegion { .. } => SuggestedAction::RunCheck,
            Error::UnknownRegion { .. } => SuggestedAction::Skip,
            Error::InvalidModel(_) => SuggestedAction::RunCheck,
            Error::Spectral(_) => SuggestedAction::Skip,
            Error::Feed(_) => SuggestedAction::FixInput,
            Error::StoreCorrupted { .. } => SuggestedAction::ManualIntervention,
            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::FixInput,
            Error::Yaml(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Run 'popp check' to validate the configuration file.",
            Error::InvalidRegion { .. } => {
                "Region ids name directories: use non-empty ids without path separators."
            }
            Error::UnknownRegion { .. } => {
                "List the configured regions with 'popp check' and pick one of them."
            }
            Error::InvalidModel(_) => {
                "Check increment and periodic_cycle; spectral models need at least 10 buckets per cycle."
            }
            Error::Spectral(_) => {
                "The cycle is too short or contains invalid estimates. Use a periodic model or a longer cycle."
            }
            Error::Feed(_) => {
                "Check the observation file format: {\"<region>\": {\"<timestamp>\": count}}."
            }
            Error::StoreCorrupted { .. } => {
                "Delete the damaged record files and re-run 'popp learn'."
            }
            Error::Io(_) => {
                "Check disk space and permissions on the database directory, then retry."
            }
            Error::Json(_) => "Invalid JSON input. Check the file with 'jq .' and fix its syntax.",
            Error::Yaml(_) => "A stored record could not be encoded or decoded as YAML.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidRegion { .. } => "Invalid Region",
            Error::UnknownRegion { .. } => "Unknown Region",
            Error::InvalidModel(_) => "Invalid Model",
            Error::Spectral(_) => "Spectral Reconstruction Failed",
            Error::Feed(_) => "Observation Feed Error",
            Error::StoreCorrupted { .. } => "Model Store Corrupted",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
            Error::Yaml(_) => "YAML Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested follow-up.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g. region, store location).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InvalidRegion { id, .. } => {
                context.insert("region".to_string(), serde_json::json!(id));
            }
            Error::UnknownRegion { region } => {
                context.insert("region".to_string(), serde_json::json!(region));
            }
            Error::StoreCorrupted { location, .. } => {
                context.insert("location".to_string(), serde_json::json!(location));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Result of a per-region fan-out that may partially succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult<T> {
    /// Successfully completed items.
    pub succeeded: Vec<T>,

    /// Failed items with their errors.
    pub failed: Vec<BatchError>,

    /// Summary statistics.
    pub summary: BatchSummary,
}

/// A single error in a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Identifier of the failed item.
    pub item_id: String,

    /// The structured error.
    pub error: StructuredError,
}

/// Summary of batch operation results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub all_succeeded: bool,
    pub any_succeeded: bool,
}

impl<T> BatchResult<T> {
    /// Create a new batch result from succeeded and failed items.
    pub fn new(succeeded: Vec<T>, failed: Vec<BatchError>) -> Self {
        let total = succeeded.len() + failed.len();
        let succeeded_count = succeeded.len();
        let failed_count = failed.len();

        BatchResult {
            succeeded,
            failed,
            summary: BatchSummary {
                total,
                succeeded: succeeded_count,
                failed: failed_count,
                all_succeeded: failed_count == 0,
                any_succeeded: succeeded_count > 0,
            },
        }
    }

    /// Add a failure to the batch result. The item id is recorded as the
    /// error's `region` context unless the error already names one.
    pub fn add_failure(&mut self, item_id: impl Into<String>, error: &Error) {
        let item_id = item_id.into();
        let mut structured = StructuredError::from(error);
        if !structured.context.contains_key("region") {
            structured = structured.with_context("region", &item_id);
        }
        self.failed.push(BatchError {
            item_id,
            error: structured,
        });
        self.summary.failed += 1;
        self.summary.total += 1;
        self.summary.all_succeeded = false;
    }

    /// Add a success to the batch result.
    pub fn add_success(&mut self, item: T) {
        self.succeeded.push(item);
        self.summary.succeeded += 1;
        self.summary.total += 1;
        self.summary.any_succeeded = true;
    }
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// Format an error for human-readable stderr output.
///
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

/// Format a batch result for human-readable output.
pub fn format_batch_human<T: std::fmt::Display>(
    result: &BatchResult<T>,
    use_color: bool,
) -> String {
    let (green, red, reset) = if use_color {
        ("\x1b[32m", "\x1b[31m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    let mut output = String::new();

    if result.summary.all_succeeded {
        output.push_str(&format!(
            "{green}✓{reset} All {} regions completed\n",
            result.summary.total,
            green = green,
            reset = reset
        ));
    } else if result.summary.any_succeeded {
        output.push_str(&format!(
            "Partial success: {} of {} regions completed\n",
            result.summary.succeeded, result.summary.total
        ));
    } else {
        output.push_str(&format!(
            "{red}✗{reset} All {} regions failed\n",
            result.summary.total,
            red = red,
            reset = reset
        ));
    }

    for item in &result.succeeded {
        output.push_str(&format!("  {}\n", item));
    }

    if !result.failed.is_empty() {
        output.push_str("\nErrors:\n");
        for batch_err in &result.failed {
            output.push_str(&format!(
                "  {red}✗{reset} {}: {}\n",
                batch_err.item_id,
                batch_err.error.message,
                red = red,
                reset = reset
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Config("test".into()).code(), 10);
        assert_eq!(
            Error::UnknownRegion {
                region: "hall".into()
            }
            .code(),
            12
        );
        assert_eq!(
            Error::Spectral(SpectralError::NotEnoughSamples { len: 3 }).code(),
            31
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::Config("test".into()).category(), ErrorCategory::Config);
        assert_eq!(Error::InvalidModel("x".into()).category(), ErrorCategory::Model);
        assert_eq!(Error::Feed("x".into()).category(), ErrorCategory::Feed);
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(io.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_error_recoverable() {
        assert!(Error::Config("test".into()).is_recoverable());
        assert!(!Error::InvalidModel("short cycle".into()).is_recoverable());
        assert!(!Error::UnknownRegion {
            region: "x".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_spectral_error_converts() {
        fn fails() -> Result<()> {
            Err(SpectralError::NotEnoughSamples { len: 4 })?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, Error::Spectral(_)));
        assert!(err.to_string().contains("4 samples"));
    }

    #[test]
    fn test_structured_error_from_error() {
        let err = Error::StoreCorrupted {
            location: "db/a".into(),
            message: "bad key".into(),
        };
        let structured = StructuredError::from(&err);

        assert_eq!(structured.code, 51);
        assert_eq!(structured.category, ErrorCategory::Store);
        assert_eq!(
            structured.suggested_action,
            SuggestedAction::ManualIntervention
        );
        assert_eq!(
            structured.context.get("location"),
            Some(&serde_json::json!("db/a"))
        );
    }

    #[test]
    fn test_structured_error_json() {
        let err = Error::UnknownRegion {
            region: "lobby".into(),
        };
        let json = StructuredError::from(&err).to_json();

        assert!(json.contains(r#""code":12"#));
        assert!(json.contains(r#""category":"config""#));
        assert!(json.contains(r#""recoverable":false"#));
        assert!(json.contains(r#""suggested_action":"skip""#));
    }

    #[test]
    fn test_batch_result() {
        let mut batch: BatchResult<String> = BatchResult::default();

        batch.add_success("kitchen".to_string());
        batch.add_success("hall".to_string());
        batch.add_failure("lab", &Error::Feed("truncated".into()));

        assert_eq!(batch.summary.total, 3);
        assert_eq!(batch.summary.succeeded, 2);
        assert_eq!(batch.summary.failed, 1);
        assert!(!batch.summary.all_succeeded);
        assert!(batch.summary.any_succeeded);
    }

    #[test]
    fn test_batch_failure_carries_region_context() {
        let mut batch: BatchResult<String> = BatchResult::default();
        batch.add_failure(
            "lab",
            &Error::StoreCorrupted {
                location: "db/lab".into(),
                message: "bad yaml".into(),
            },
        );
        batch.add_failure(
            "hall",
            &Error::UnknownRegion {
                region: "attic".into(),
            },
        );

        let store = &batch.failed[0].error.context;
        assert_eq!(store["region"], "lab");
        assert_eq!(store["location"], "db/lab");
        assert_eq!(batch.failed[1].error.context["region"], "attic");
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::UnknownRegion {
            region: "attic".into(),
        };
        let formatted = format_error_human(&err, false);

        assert!(formatted.contains("Unknown Region"));
        assert!(formatted.contains("unknown region: attic"));
        assert!(formatted.contains("popp check"));
    }

    #[test]
    fn test_format_batch_human_partial() {
        let mut batch: BatchResult<String> = BatchResult::default();
        batch.add_success("kitchen".to_string());
        batch.add_failure("lab", &Error::Feed("truncated".into()));

        let out = format_batch_human(&batch, false);
        assert!(out.contains("Partial success: 1 of 2"));
        assert!(out.contains("lab: observation feed error: truncated"));
    }

    #[test]
    fn test_display_impls() {
        assert_eq!(ErrorCategory::Store.to_string(), "store");
        assert_eq!(SuggestedAction::FixInput.to_string(), "fix_input");
    }
}
