//! Fuzz target for config.json parsing and validation.
//!
//! Tests that model configuration parsing and semantic validation handle
//! arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use popp_config::{validate_config, ModelConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = ModelConfig::from_json(text) {
        if validate_config(&config).is_ok() {
            // A valid config always yields valid region ids
            assert!(config.region_ids().is_ok());
            let _ = config.buckets_per_cycle();
        }
    }
});
