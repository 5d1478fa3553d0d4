//! Exit codes for the popp CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-9: Operational outcomes
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

use popp_common::{Error, ErrorCategory};

/// Exit codes for popp operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-9)
    // ========================================================================
    /// Success: every region completed
    Clean = 0,

    /// Partial failure: some regions failed
    PartialFail = 3,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Configuration missing or invalid
    ConfigError = 11,

    /// Region not present in the configuration
    RegionError = 12,

    /// Observation feed missing or malformed
    FeedError = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is a user/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::RegionError => "ERR_REGION",
            ExitCode::FeedError => "ERR_FEED",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Map a library error onto the exit code reported for it.
    pub fn for_error(err: &Error) -> Self {
        match err {
            Error::UnknownRegion { .. } | Error::InvalidRegion { .. } => ExitCode::RegionError,
            _ => Self::for_category(err.category()),
        }
    }

    pub fn for_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Feed => ExitCode::FeedError,
            ErrorCategory::Store | ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Model => ExitCode::InternalError,
        }
    }

    /// Exit code for a fan-out: clean, partial, or the given failure code.
    pub fn for_batch(total: usize, failed: usize, all_failed: ExitCode) -> Self {
        if failed == 0 {
            ExitCode::Clean
        } else if failed < total {
            ExitCode::PartialFail
        } else {
            all_failed
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
