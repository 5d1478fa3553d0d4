//! Rate models.
//!
//! Layers compose from the inside out:
//!
//! ```text
//! SpectralLayer ─wraps─▶ PeriodicFolder ─wraps─▶ TimeBucketStore ─holds─▶ Rate per bucket
//! ```
//!
//! Every layer implements [`RateModel`], and [`RegionModel`] picks one of the
//! two outer layers per region.

mod bucket;
mod periodic;
mod rate;
mod region;
mod spectral;

pub use bucket::TimeBucketStore;
pub use periodic::PeriodicFolder;
pub use popp_config::ModelKind;
pub use rate::{Rate, LOWER_PERCENTILE, PRIOR_ALPHA, PRIOR_BETA, UPPER_PERCENTILE};
pub use region::RegionModel;
pub use spectral::{SpectralLayer, SPECTRAL_FLOOR};

use std::collections::BTreeMap;

use popp_common::Result;
use serde::{Deserialize, Serialize};

/// Event counts keyed by absolute timestamp (seconds).
pub type Observations = BTreeMap<i64, u64>;

/// Point estimates keyed by bucket timestamp (seconds).
pub type Estimates = BTreeMap<i64, f64>;

/// Which point estimate to read out of a [`Rate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Estimator {
    /// Posterior mode (MAP).
    #[default]
    Mode,
    /// Posterior mean.
    Mean,
    /// 95th percentile.
    Upper,
    /// 5th percentile.
    Lower,
}

impl Estimator {
    /// Resolve CLI-style flags: upper beats lower beats mean beats mode.
    pub fn from_flags(mean: bool, upper: bool, lower: bool) -> Self {
        if upper {
            Estimator::Upper
        } else if lower {
            Estimator::Lower
        } else if mean {
            Estimator::Mean
        } else {
            Estimator::Mode
        }
    }
}

impl std::fmt::Display for Estimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Estimator::Mode => write!(f, "mode"),
            Estimator::Mean => write!(f, "mean"),
            Estimator::Upper => write!(f, "upper"),
            Estimator::Lower => write!(f, "lower"),
        }
    }
}

/// Shared interface of the bucket store and the layers wrapping it.
pub trait RateModel {
    /// Bucket width in seconds.
    fn increment(&self) -> i64;

    /// Rate covering `t`, or a fresh prior when nothing is known.
    fn get_at(&self, t: i64) -> Rate;

    /// Replace the rate covering `t`.
    fn set_at(&mut self, t: i64, rate: Rate) -> Result<()>;

    /// Fold a batch of counts into the model.
    fn update(&mut self, observations: &Observations) -> Result<()>;

    /// Point estimates for every bucket in `[bucket(start), bucket(end))`.
    fn retrieve(&self, start: i64, end: i64, estimator: Estimator) -> Estimates;

    /// Persist every known bucket, returning how many were written.
    fn save(&self) -> Result<usize>;

    /// Restore from the record store. `Ok(false)` when nothing was found.
    fn load(&mut self) -> Result<bool>;
}

/// Floor `t` to a multiple of `increment`, rounding toward negative infinity.
pub(crate) fn bucket_of(t: i64, increment: i64) -> i64 {
    t.div_euclid(increment) * increment
}

/// Bucket timestamps in `[bucket(start), bucket(end))`.
pub(crate) fn bucket_range(start: i64, end: i64, increment: i64) -> impl Iterator<Item = i64> {
    let first = bucket_of(start, increment);
    let last = bucket_of(end, increment);
    (0..)
        .map(move |step: i64| first + step * increment)
        .take_while(move |t| *t < last)
}
