//! Periodic folding of absolute time onto one representative cycle.
//!
//! The bucket of the first timestamp ever folded, whether by a read or a
//! write, becomes the pivot. Every later timestamp `t` maps to
//! `pivot + (t - pivot) mod cycle`, so observations from many days (for a
//! daily cycle) accumulate into the same buckets.

use std::cell::Cell;

use popp_common::{Error, Result};
use tracing::debug;

use super::{
    bucket_of, bucket_range, Estimates, Estimator, Observations, Rate, RateModel, TimeBucketStore,
};

/// Folds absolute time into one cycle before delegating to a bucket store.
#[derive(Debug)]
pub struct PeriodicFolder {
    inner: TimeBucketStore,
    periodic_cycle: i64,
    /// Fixed by the first fold, reads included.
    pivot: Cell<Option<i64>>,
}

impl PeriodicFolder {
    pub fn new(inner: TimeBucketStore, periodic_cycle: i64) -> Result<Self> {
        if periodic_cycle <= 0 {
            return Err(Error::InvalidModel(format!(
                "periodic cycle must be positive, got {}",
                periodic_cycle
            )));
        }
        Ok(PeriodicFolder {
            inner,
            periodic_cycle,
            pivot: Cell::new(None),
        })
    }

    pub fn periodic_cycle(&self) -> i64 {
        self.periodic_cycle
    }

    /// Anchor of the folded cycle, once any timestamp has been folded.
    pub fn pivot(&self) -> Option<i64> {
        self.pivot.get()
    }

    pub fn inner(&self) -> &TimeBucketStore {
        &self.inner
    }

    /// Cycle-relative time of `t`. The first call fixes the pivot to the
    /// bucket containing `t`.
    pub fn fold(&self, t: i64) -> i64 {
        let pivot = match self.pivot.get() {
            Some(pivot) => pivot,
            None => {
                let pivot = bucket_of(t, self.inner.increment());
                self.pivot.set(Some(pivot));
                pivot
            }
        };
        pivot + (t - pivot).rem_euclid(self.periodic_cycle)
    }

    /// Start and end of the cycle window: `[pivot, pivot + cycle)`, or from 0
    /// when no pivot is established.
    pub fn cycle_window(&self) -> (i64, i64) {
        let start = self.pivot.get().unwrap_or(0);
        (start, start + self.periodic_cycle)
    }

    /// One full cycle of point estimates.
    pub fn retrieve_full_cycle(&self, estimator: Estimator) -> Estimates {
        let (start, end) = self.cycle_window();
        self.retrieve(start, end, estimator)
    }
}

impl RateModel for PeriodicFolder {
    fn increment(&self) -> i64 {
        self.inner.increment()
    }

    fn get_at(&self, t: i64) -> Rate {
        self.inner.get_at(self.fold(t))
    }

    fn set_at(&mut self, t: i64, rate: Rate) -> Result<()> {
        let folded = self.fold(t);
        self.inner.set_at(folded, rate)
    }

    fn update(&mut self, observations: &Observations) -> Result<()> {
        // BTreeMap iteration is ascending, so a fresh pivot comes from the earliest timestamp
        let folded: Vec<(i64, u64)> = observations
            .iter()
            .map(|(t, count)| (self.fold(*t), *count))
            .collect();
        debug!(
            observations = folded.len(),
            pivot = ?self.pivot.get(),
            cycle = self.periodic_cycle,
            "folded observations"
        );
        self.inner.update_pairs(folded);
        Ok(())
    }

    fn retrieve(&self, start: i64, end: i64, estimator: Estimator) -> Estimates {
        bucket_range(start, end, self.increment())
            .map(|t| (t, self.get_at(t).estimate(estimator)))
            .collect()
    }

    fn save(&self) -> Result<usize> {
        self.inner.save()
    }

    fn load(&mut self) -> Result<bool> {
        let found = self.inner.load()?;
        if found {
            self.pivot.set(self.inner.min_key());
        }
        Ok(found)
    }
}
