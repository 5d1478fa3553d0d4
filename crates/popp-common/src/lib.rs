//! popp common types, region ids, and errors.
//!
//! This crate provides foundational types shared across popp crates:
//! - Region identity with path-safety guarantees
//! - The shared error type and per-region batch results
//! - Output format specifications

pub mod error;
pub mod output;
pub mod region;

pub use error::{BatchResult, Error, ErrorCategory, Result, StructuredError};
pub use output::OutputFormat;
pub use region::RegionId;
