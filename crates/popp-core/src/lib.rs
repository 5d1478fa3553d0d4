//! popp core library.
//!
//! This library provides the rate-modeling engine and its plumbing:
//! - Gamma-Poisson bucket rates, periodic folding and spectral smoothing
//! - Durable record stores and observation feeds
//! - The per-region registry driven by the `popp` binary
//! - Configuration loading, logging and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod exit_codes;
pub mod feed;
pub mod logging;
pub mod model;
pub mod registry;
pub mod store;

pub use model::{
    Estimates, Estimator, ModelKind, Observations, PeriodicFolder, Rate, RateModel, RegionModel,
    SpectralLayer, TimeBucketStore,
};
pub use registry::RegionRegistry;
pub use store::{MemoryRecordStore, RateRecord, RecordStore, YamlRecordStore};
