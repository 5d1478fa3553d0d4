//! Gamma-Poisson conjugate rate for a single time bucket.
//!
//! The event intensity `λ` of one bucket carries a `Gamma(α, β)` posterior
//! (rate parameterization). Observing counts `c_1..c_n`, each covering
//! `interval` seconds, gives the closed-form update
//!
//! ```text
//! α' = α + Σ c_i
//! β' = β + n · interval
//! ```
//!
//! so the update is exact and independent of batching order.

use popp_math::{gamma_inv_cdf, gamma_mean, gamma_mode};

use super::Estimator;
use crate::store::RateRecord;

/// Weak prior shape every bucket starts from.
pub const PRIOR_ALPHA: f64 = 1.1;

/// Weak prior rate every bucket starts from.
pub const PRIOR_BETA: f64 = 1.1;

/// Percentile used for the upper credible bound.
pub const UPPER_PERCENTILE: f64 = 0.95;

/// Percentile used for the lower credible bound.
pub const LOWER_PERCENTILE: f64 = 0.05;

/// Bayesian estimate of one bucket's Poisson intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    alpha: f64,
    beta: f64,
    interval: f64,
    mode: f64,
    mean: f64,
}

impl Default for Rate {
    fn default() -> Self {
        Rate::new(1.0)
    }
}

impl Rate {
    /// Fresh rate at the weak prior `Gamma(1.1, 1.1)`.
    pub fn new(interval: f64) -> Self {
        let mut rate = Rate {
            alpha: PRIOR_ALPHA,
            beta: PRIOR_BETA,
            interval,
            mode: 0.0,
            mean: 0.0,
        };
        rate.refresh_moments();
        rate
    }

    /// Restore a rate directly from its Gamma parameters.
    ///
    /// Returns `None` unless both parameters are finite and positive.
    pub fn from_params(alpha: f64, beta: f64, interval: f64) -> Option<Self> {
        if !(alpha.is_finite() && beta.is_finite() && alpha > 0.0 && beta > 0.0) {
            return None;
        }
        let mut rate = Rate {
            alpha,
            beta,
            interval,
            mode: 0.0,
            mean: 0.0,
        };
        rate.refresh_moments();
        Some(rate)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Posterior mode, or `-1.0` when `alpha < 1`.
    pub fn mode(&self) -> f64 {
        self.mode
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Conjugate update with one count per observation.
    pub fn update(&mut self, counts: &[u64]) {
        // Folded counts can add up past u64::MAX
        self.alpha += counts.iter().map(|&c| c as f64).sum::<f64>();
        self.beta += counts.len() as f64 * self.interval;
        self.refresh_moments();
    }

    /// Overwrite the distribution from a point estimate.
    ///
    /// With `as_map` the value is taken as the mode (`α = v·β + 1`),
    /// otherwise as the mean (`α = v·β`). Negative or non-finite values, and
    /// non-positive `beta` overrides, are rejected without mutation.
    pub fn set(&mut self, value: f64, beta: Option<f64>, as_map: bool) -> bool {
        if !value.is_finite() || value < 0.0 {
            return false;
        }
        if let Some(b) = beta {
            if !b.is_finite() || b <= 0.0 {
                return false;
            }
            self.beta = b;
        }
        self.alpha = if as_map {
            value * self.beta + 1.0
        } else {
            value * self.beta
        };
        self.refresh_moments();
        true
    }

    /// Inverse CDF of the posterior at `p`.
    pub fn percentile(&self, p: f64) -> f64 {
        // Degenerate point mass at zero
        if self.alpha == 0.0 {
            return 0.0;
        }
        gamma_inv_cdf(p, self.alpha, self.beta)
    }

    pub fn upper(&self) -> f64 {
        self.percentile(UPPER_PERCENTILE)
    }

    pub fn lower(&self) -> f64 {
        self.percentile(LOWER_PERCENTILE)
    }

    /// Point estimate selected by `estimator`.
    pub fn estimate(&self, estimator: Estimator) -> f64 {
        match estimator {
            Estimator::Mode => self.mode,
            Estimator::Mean => self.mean,
            Estimator::Upper => self.upper(),
            Estimator::Lower => self.lower(),
        }
    }

    /// Persistable `{alpha, beta}` pair.
    pub fn record(&self) -> RateRecord {
        RateRecord {
            alpha: self.alpha,
            beta: self.beta,
        }
    }

    fn refresh_moments(&mut self) {
        self.mode = gamma_mode(self.alpha, self.beta);
        // alpha reaches 0 when a zero mean is injected
        self.mean = if self.alpha == 0.0 {
            0.0
        } else {
            gamma_mean(self.alpha, self.beta)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use popp_math::MODE_UNDEFINED;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    // ==================== Prior tests ====================

    #[test]
    fn fresh_rate_is_weak_prior() {
        let rate = Rate::new(60.0);
        assert_eq!(rate.alpha(), 1.1);
        assert_eq!(rate.beta(), 1.1);
        assert!(approx_eq(rate.mode(), 0.1 / 1.1, 1e-12));
        assert!(approx_eq(rate.mean(), 1.0, 1e-12));
        assert_eq!(rate.interval(), 60.0);
    }

    // ==================== Update tests ====================

    #[test]
    fn update_adds_counts_and_exposure() {
        let mut rate = Rate::new(60.0);
        rate.update(&[1, 1]);
        assert!(approx_eq(rate.alpha(), 3.1, 1e-12));
        assert!(approx_eq(rate.beta(), 121.1, 1e-12));
        assert!(approx_eq(rate.mode(), 2.1 / 121.1, 1e-12));
        assert!(approx_eq(rate.mean(), 3.1 / 121.1, 1e-12));
    }

    #[test]
    fn update_is_batch_independent() {
        let mut one = Rate::new(10.0);
        one.update(&[3, 0, 2, 5]);

        let mut many = Rate::new(10.0);
        many.update(&[5]);
        many.update(&[0, 3]);
        many.update(&[2]);

        assert!(approx_eq(one.alpha(), many.alpha(), 1e-12));
        assert!(approx_eq(one.beta(), many.beta(), 1e-12));
    }

    #[test]
    fn huge_counts_do_not_overflow() {
        let mut rate = Rate::new(60.0);
        rate.update(&[u64::MAX, u64::MAX]);
        assert!(rate.alpha().is_finite());
        assert!(rate.alpha() >= 2.0 * u64::MAX as f64);
        assert!(approx_eq(rate.beta(), 121.1, 1e-12));
    }

    #[test]
    fn empty_update_is_noop() {
        let mut rate = Rate::new(60.0);
        rate.update(&[]);
        assert_eq!(rate, Rate::new(60.0));
    }

    // ==================== Injection tests ====================

    #[test]
    fn set_as_map_targets_mode() {
        let mut rate = Rate::new(1.0);
        assert!(rate.set(0.5, Some(4.0), true));
        assert!(approx_eq(rate.alpha(), 3.0, 1e-12));
        assert!(approx_eq(rate.beta(), 4.0, 1e-12));
        assert!(approx_eq(rate.mode(), 0.5, 1e-12));
    }

    #[test]
    fn set_as_mean_targets_mean() {
        let mut rate = Rate::new(1.0);
        assert!(rate.set(0.25, Some(8.0), false));
        assert!(approx_eq(rate.alpha(), 2.0, 1e-12));
        assert!(approx_eq(rate.mean(), 0.25, 1e-12));
    }

    #[test]
    fn set_keeps_beta_without_override() {
        let mut rate = Rate::new(60.0);
        rate.update(&[1]);
        let beta = rate.beta();
        assert!(rate.set(0.1, None, false));
        assert_eq!(rate.beta(), beta);
    }

    #[test]
    fn negative_injection_is_rejected() {
        let mut rate = Rate::new(60.0);
        rate.update(&[4]);
        let before = rate;
        assert!(!rate.set(-0.5, Some(2.0), true));
        assert!(!rate.set(f64::NAN, None, true));
        assert!(!rate.set(1.0, Some(0.0), true));
        assert_eq!(rate, before);
    }

    #[test]
    fn small_mean_injection_yields_mode_sentinel() {
        let mut rate = Rate::new(1.0);
        assert!(rate.set(0.001, Some(100.0), false));
        assert!(rate.alpha() < 1.0);
        assert_eq!(rate.mode(), MODE_UNDEFINED);
        assert!(approx_eq(rate.mean(), 0.001, 1e-12));
    }

    #[test]
    fn zero_mean_injection_is_accepted() {
        let mut rate = Rate::new(1.0);
        assert!(rate.set(0.0, None, false));
        assert_eq!(rate.alpha(), 0.0);
        assert_eq!(rate.mean(), 0.0);
        assert_eq!(rate.mode(), MODE_UNDEFINED);
    }

    // ==================== Restore tests ====================

    #[test]
    fn from_params_restores_exactly() {
        let rate = Rate::from_params(0.4, 2.0, 60.0).unwrap();
        assert_eq!(rate.alpha(), 0.4);
        assert_eq!(rate.beta(), 2.0);
        assert_eq!(rate.mode(), MODE_UNDEFINED);
        assert!(approx_eq(rate.mean(), 0.2, 1e-12));
    }

    #[test]
    fn from_params_rejects_invalid() {
        assert!(Rate::from_params(0.0, 1.0, 1.0).is_none());
        assert!(Rate::from_params(1.0, -1.0, 1.0).is_none());
        assert!(Rate::from_params(f64::INFINITY, 1.0, 1.0).is_none());
    }

    // ==================== Estimate tests ====================

    #[test]
    fn bounds_bracket_the_mean() {
        let mut rate = Rate::new(60.0);
        rate.update(&[2, 0, 1, 3]);
        let lower = rate.lower();
        let upper = rate.upper();
        assert!(lower < rate.mean() && rate.mean() < upper);
        assert_eq!(rate.estimate(Estimator::Upper), upper);
        assert_eq!(rate.estimate(Estimator::Lower), lower);
        assert_eq!(rate.estimate(Estimator::Mode), rate.mode());
        assert_eq!(rate.estimate(Estimator::Mean), rate.mean());
    }

    #[test]
    fn record_exports_parameters() {
        let mut rate = Rate::new(60.0);
        rate.update(&[1]);
        let record = rate.record();
        assert_eq!(record.alpha, rate.alpha());
        assert_eq!(record.beta, rate.beta());
    }
}
