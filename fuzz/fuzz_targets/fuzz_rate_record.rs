//! Fuzz target for persisted bucket records.
//!
//! Tests that YAML record parsing and restoring a model from arbitrary
//! records never panics.

#![no_main]

use libfuzzer_sys::fuzz_target;
use popp_core::model::{Estimator, PeriodicFolder, RateModel};
use popp_core::{MemoryRecordStore, RateRecord, TimeBucketStore};

fuzz_target!(|data: &[u8]| {
    let Ok(record) = serde_yaml::from_slice::<RateRecord>(data) else {
        return;
    };

    let store = MemoryRecordStore::new();
    store.insert(0, record);
    let Ok(inner) = TimeBucketStore::new(60, Box::new(store)) else {
        return;
    };
    let Ok(mut model) = PeriodicFolder::new(inner, 600) else {
        return;
    };
    if model.load().is_ok() {
        for estimator in [Estimator::Mode, Estimator::Mean, Estimator::Upper, Estimator::Lower] {
            let _ = model.retrieve_full_cycle(estimator);
        }
    }
});
