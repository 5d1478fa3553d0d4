//! Fixed-width time buckets, each holding one [`Rate`].

use std::collections::BTreeMap;

use popp_common::{Error, Result};
use tracing::{debug, info, warn};

use super::{bucket_of, bucket_range, Estimates, Estimator, Observations, Rate, RateModel};
use crate::store::{MemoryRecordStore, RecordStore};

/// Rates for absolute time buckets of `increment` seconds.
#[derive(Debug)]
pub struct TimeBucketStore {
    increment: i64,
    rates: BTreeMap<i64, Rate>,
    store: Box<dyn RecordStore>,
}

impl TimeBucketStore {
    pub fn new(increment: i64, store: Box<dyn RecordStore>) -> Result<Self> {
        if increment <= 0 {
            return Err(Error::InvalidModel(format!(
                "increment must be positive, got {}",
                increment
            )));
        }
        Ok(TimeBucketStore {
            increment,
            rates: BTreeMap::new(),
            store,
        })
    }

    /// Store persisting to a fresh [`MemoryRecordStore`].
    pub fn in_memory(increment: i64) -> Result<Self> {
        Self::new(increment, Box::new(MemoryRecordStore::new()))
    }

    /// Start of the bucket containing `t`.
    pub fn bucket(&self, t: i64) -> i64 {
        bucket_of(t, self.increment)
    }

    /// Fresh prior rate for this bucket width.
    pub fn default_rate(&self) -> Rate {
        Rate::new(self.increment as f64)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Known bucket keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.rates.keys().copied()
    }

    pub fn min_key(&self) -> Option<i64> {
        self.rates.keys().next().copied()
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Apply one observation per `(timestamp, count)` pair.
    ///
    /// Unlike [`RateModel::update`] this accepts repeated timestamps, which
    /// the periodic layer produces once several cycles fold together.
    pub fn update_pairs(&mut self, pairs: impl IntoIterator<Item = (i64, u64)>) {
        let mut grouped: BTreeMap<i64, Vec<u64>> = BTreeMap::new();
        for (t, count) in pairs {
            grouped.entry(self.bucket(t)).or_default().push(count);
        }

        for (key, counts) in grouped {
            let fresh = self.default_rate();
            let rate = self.rates.entry(key).or_insert(fresh);
            rate.update(&counts);
            debug!(
                bucket = key,
                observations = counts.len(),
                alpha = rate.alpha(),
                beta = rate.beta(),
                "bucket updated"
            );
        }
    }

    fn restore(&self, key: i64, alpha: f64, beta: f64) -> Option<Rate> {
        let mut rate = self.default_rate();
        if rate.set((alpha - 1.0) / beta, Some(beta), true) {
            return Some(rate);
        }

        // Mode injection rejects alpha < 1; keep the stored parameters as-is
        let restored = Rate::from_params(alpha, beta, self.increment as f64)?;
        warn!(
            bucket = key,
            alpha,
            beta,
            location = %self.store.location(),
            "record has alpha < 1, restored with undefined mode"
        );
        Some(restored)
    }
}

impl RateModel for TimeBucketStore {
    fn increment(&self) -> i64 {
        self.increment
    }

    fn get_at(&self, t: i64) -> Rate {
        self.rates
            .get(&self.bucket(t))
            .copied()
            .unwrap_or_else(|| self.default_rate())
    }

    fn set_at(&mut self, t: i64, rate: Rate) -> Result<()> {
        let key = self.bucket(t);
        self.rates.insert(key, rate);
        Ok(())
    }

    fn update(&mut self, observations: &Observations) -> Result<()> {
        self.update_pairs(observations.iter().map(|(t, c)| (*t, *c)));
        Ok(())
    }

    fn retrieve(&self, start: i64, end: i64, estimator: Estimator) -> Estimates {
        bucket_range(start, end, self.increment)
            .map(|t| (t, self.get_at(t).estimate(estimator)))
            .collect()
    }

    fn save(&self) -> Result<usize> {
        for (key, rate) in &self.rates {
            self.store.write(*key, &rate.record())?;
        }
        info!(
            buckets = self.rates.len(),
            location = %self.store.location(),
            "saved bucket rates"
        );
        Ok(self.rates.len())
    }

    fn load(&mut self) -> Result<bool> {
        let records = self.store.read_all()?;
        let mut restored = 0usize;

        for (raw_key, record) in records {
            let key = self.bucket(raw_key);
            if key != raw_key {
                warn!(key = raw_key, bucket = key, "record key not aligned to increment");
            }

            match self.restore(key, record.alpha, record.beta) {
                Some(rate) => {
                    self.rates.insert(key, rate);
                    restored += 1;
                }
                None => {
                    warn!(
                        bucket = key,
                        alpha = record.alpha,
                        beta = record.beta,
                        "skipping record with non-positive parameters"
                    );
                }
            }
        }

        info!(
            buckets = restored,
            location = %self.store.location(),
            "loaded bucket rates"
        );
        Ok(restored > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RateRecord;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn obs(pairs: &[(i64, u64)]) -> Observations {
        pairs.iter().copied().collect()
    }

    #[test]
    fn rejects_non_positive_increment() {
        assert!(matches!(
            TimeBucketStore::in_memory(0).unwrap_err(),
            Error::InvalidModel(_)
        ));
        assert!(TimeBucketStore::in_memory(-60).is_err());
    }

    #[test]
    fn update_groups_by_bucket() {
        let mut store = TimeBucketStore::in_memory(60).unwrap();
        store.update(&obs(&[(0, 1), (30, 2), (61, 0)])).unwrap();

        let first = store.get_at(59);
        assert!(approx_eq(first.alpha(), 4.1, 1e-12));
        assert!(approx_eq(first.beta(), 121.1, 1e-12));

        let second = store.get_at(60);
        assert!(approx_eq(second.alpha(), 1.1, 1e-12));
        assert!(approx_eq(second.beta(), 61.1, 1e-12));
        assert_eq!(store.keys().collect::<Vec<_>>(), vec![0, 60]);
    }

    #[test]
    fn reads_never_create_buckets() {
        let store = TimeBucketStore::in_memory(60).unwrap();
        let rate = store.get_at(12_345);
        assert_eq!(rate, store.default_rate());
        assert!(store.is_empty());
    }

    #[test]
    fn retrieve_defaults_missing_buckets_to_prior() {
        let mut store = TimeBucketStore::in_memory(60).unwrap();
        store.update(&obs(&[(60, 3)])).unwrap();

        let estimates = store.retrieve(0, 180, Estimator::Mean);
        assert_eq!(estimates.keys().copied().collect::<Vec<_>>(), vec![0, 60, 120]);
        assert!(approx_eq(estimates[&0], 1.0, 1e-12));
        assert!(approx_eq(estimates[&60], 4.1 / 61.1, 1e-12));
        assert!(approx_eq(estimates[&120], 1.0, 1e-12));
    }

    #[test]
    fn set_at_buckets_key() {
        let mut store = TimeBucketStore::in_memory(60).unwrap();
        let mut rate = store.default_rate();
        rate.update(&[5]);
        store.set_at(-1, rate).unwrap();
        assert_eq!(store.min_key(), Some(-60));
        assert_eq!(store.get_at(-30), rate);
    }

    #[test]
    fn save_then_load_restores_parameters() {
        let records = MemoryRecordStore::new();
        let mut store = TimeBucketStore::new(60, Box::new(records.clone())).unwrap();
        store.update(&obs(&[(0, 1), (60, 4), (120, 0)])).unwrap();
        assert_eq!(store.save().unwrap(), 3);
        assert_eq!(records.len(), 3);

        let mut fresh = TimeBucketStore::new(60, Box::new(records)).unwrap();
        assert!(fresh.load().unwrap());
        for key in [0, 60, 120] {
            let a = store.get_at(key);
            let b = fresh.get_at(key);
            assert!(approx_eq(a.alpha(), b.alpha(), 1e-9), "alpha at {}", key);
            assert!(approx_eq(a.beta(), b.beta(), 1e-9), "beta at {}", key);
        }
    }

    #[test]
    fn load_from_empty_store_is_false() {
        let mut store = TimeBucketStore::in_memory(60).unwrap();
        assert!(!store.load().unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn load_keeps_alpha_below_one() {
        let records = MemoryRecordStore::new();
        records.insert(0, RateRecord { alpha: 0.5, beta: 2.0 });
        records.insert(60, RateRecord { alpha: -1.0, beta: 2.0 });

        let mut store = TimeBucketStore::new(60, Box::new(records)).unwrap();
        assert!(store.load().unwrap());
        assert_eq!(store.len(), 1);

        let rate = store.get_at(0);
        assert_eq!(rate.alpha(), 0.5);
        assert_eq!(rate.beta(), 2.0);
        assert_eq!(rate.mode(), popp_math::MODE_UNDEFINED);
    }

    #[test]
    fn load_realigns_unaligned_keys() {
        let records = MemoryRecordStore::new();
        records.insert(75, RateRecord { alpha: 2.0, beta: 2.0 });

        let mut store = TimeBucketStore::new(60, Box::new(records)).unwrap();
        assert!(store.load().unwrap());
        assert_eq!(store.keys().collect::<Vec<_>>(), vec![60]);
    }
}
