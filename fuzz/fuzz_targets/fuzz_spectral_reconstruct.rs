//! Fuzz target for spectral reconstruction.
//!
//! Tests that both selection techniques handle arbitrary signals without
//! panicking, and that the floored output never drops below the floor.

#![no_main]

use libfuzzer_sys::fuzz_target;
use popp_math::spectral::{rectify, reconstruct, Technique};

fuzz_target!(|signal: Vec<f64>| {
    if signal.len() > 4096 {
        return;
    }
    for technique in [Technique::Bam, Technique::Aam] {
        if let Ok(rebuilt) = reconstruct(&signal, technique) {
            assert_eq!(rebuilt.signal.len(), signal.len());
            let floored = rectify(&rebuilt.signal, 0.001, f64::INFINITY);
            assert!(floored.iter().all(|v| v.is_nan() || *v >= 0.001));
        }
    }
});
