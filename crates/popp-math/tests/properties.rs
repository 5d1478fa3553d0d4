//! Property-based tests for popp-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use popp_math::spectral::{self, Technique};
use popp_math::{gamma_cdf, gamma_inv_cdf, gamma_mean, gamma_mode};
use proptest::prelude::*;

/// Tolerance for CDF round-trips.
const CDF_TOL: f64 = 1e-7;

// ============================================================================
// Gamma quantile properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The quantile function inverts the CDF.
    #[test]
    fn inv_cdf_round_trips(alpha in 0.2..200.0f64, beta in 0.01..500.0f64, p in 0.001..0.999f64) {
        let x = gamma_inv_cdf(p, alpha, beta);
        prop_assert!(
            x.is_finite() && x >= 0.0,
            "quantile({}) = {} for Gamma({}, {})",
            p, x, alpha, beta
        );
        let back = gamma_cdf(x, alpha, beta);
        prop_assert!(
            (back - p).abs() < CDF_TOL,
            "cdf(quantile({})) = {} for Gamma({}, {})",
            p, back, alpha, beta
        );
    }

    /// Quantiles are non-decreasing in p.
    #[test]
    fn inv_cdf_monotone(
        alpha in 0.5..50.0f64,
        beta in 0.1..100.0f64,
        p in 0.01..0.98f64,
        dp in 0.001..0.01f64,
    ) {
        let lo = gamma_inv_cdf(p, alpha, beta);
        let hi = gamma_inv_cdf(p + dp, alpha, beta);
        prop_assert!(hi >= lo, "q({})={} > q({})={}", p, lo, p + dp, hi);
    }

    /// For α >= 1 the mode never exceeds the mean.
    #[test]
    fn mode_below_mean(alpha in 1.0..1000.0f64, beta in 0.01..1000.0f64) {
        prop_assert!(gamma_mode(alpha, beta) <= gamma_mean(alpha, beta));
    }
}

// ============================================================================
// Spectral properties
// ============================================================================

fn signal_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..5.0f64, 10..160)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Rectified samples always lie within the bounds.
    #[test]
    fn rectify_respects_bounds(
        signal in prop::collection::vec(-10.0..10.0f64, 0..64),
        low in -2.0..0.0f64,
        span in 0.0..4.0f64,
    ) {
        let high = low + span;
        for v in spectral::rectify(&signal, low, high) {
            prop_assert!(v >= low && v <= high);
        }
    }

    /// Reconstruction preserves length and is deterministic.
    #[test]
    fn reconstruct_deterministic(signal in signal_strategy(), bam in any::<bool>()) {
        let technique = if bam { Technique::Bam } else { Technique::Aam };
        let a = spectral::reconstruct(&signal, technique).unwrap();
        let b = spectral::reconstruct(&signal, technique).unwrap();
        prop_assert_eq!(a.signal.len(), signal.len());
        prop_assert_eq!(a.residue.len(), signal.len());
        prop_assert!(a.components.len() <= spectral::default_component_count(signal.len()));
        prop_assert_eq!(a, b);
    }

    /// The first selected component is always the DC term for a positive signal.
    #[test]
    fn positive_signal_leads_with_dc(signal in prop::collection::vec(1.0..5.0f64, 10..160)) {
        let out = spectral::reconstruct(&signal, Technique::Aam).unwrap();
        prop_assert_eq!(out.components[0].frequency, 0);
        let mean = signal.iter().sum::<f64>() / signal.len() as f64;
        prop_assert!((out.components[0].amplitude - mean).abs() < 1e-9);
    }
}
