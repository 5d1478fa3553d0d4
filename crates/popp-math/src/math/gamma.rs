//! Gamma distribution utilities for conjugate Poisson rate models.
//!
//! A Poisson intensity `λ` with a `Gamma(α, β)` prior stays Gamma after
//! observing counts, so the posterior is fully described by `(α, β)`.
//! This module provides the moments, CDF and inverse CDF needed to turn
//! that posterior into point estimates and credible bounds.
//!
//! # Parameterization
//!
//! Uses **rate parameterization**: `Gamma(α, β)` where:
//! - `α` = shape parameter (α > 0)
//! - `β` = rate parameter (β > 0)
//!
//! This is equivalent to scale parameterization with `θ = 1/β`.

use super::stable::log_gamma;

// Constants for incomplete gamma computation
const GAMMAINC_MAX_ITERS: usize = 200;
const GAMMAINC_EPS: f64 = 3.0e-12;
const GAMMAINC_FPMIN: f64 = 1.0e-30;

// Constants for quantile bisection
const GAMMA_INV_MAX_ITERS: usize = 200;
const GAMMA_INV_MAX_DOUBLINGS: usize = 1100;
const GAMMA_INV_XTOL: f64 = 1.0e-13;

/// Sentinel returned by [`gamma_mode`] when the mode is not interior (α < 1).
pub const MODE_UNDEFINED: f64 = -1.0;

/// Regularized lower incomplete gamma function P(a, x).
///
/// P(a, x) = γ(a, x) / Γ(a), the CDF of Gamma(a, 1) evaluated at x.
pub fn gamma_p(a: f64, x: f64) -> f64 {
    if a.is_nan() || x.is_nan() {
        return f64::NAN;
    }
    if a <= 0.0 || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return 0.0;
    }
    if x.is_infinite() {
        return 1.0;
    }

    // Series converges fast below a+1, the continued fraction above it.
    if x < a + 1.0 {
        gammainc_series(a, x)
    } else {
        1.0 - gammainc_cf(a, x)
    }
}

/// Series expansion for P(a, x) when x < a+1.
///
/// P(a, x) = e^(-x) * x^a * Σ_{n=0}^∞ x^n / Γ(a+n+1)
fn gammainc_series(a: f64, x: f64) -> f64 {
    let log_prefactor = a * x.ln() - x - log_gamma(a);

    let mut term = 1.0 / a;
    let mut sum = term;
    for n in 1..=GAMMAINC_MAX_ITERS {
        term *= x / (a + n as f64);
        sum += term;
        if term.abs() < GAMMAINC_EPS * sum.abs() {
            break;
        }
    }

    (log_prefactor.exp() * sum).clamp(0.0, 1.0)
}

/// Continued fraction for Q(a, x) when x >= a+1 (modified Lentz).
fn gammainc_cf(a: f64, x: f64) -> f64 {
    let log_prefactor = a * x.ln() - x - log_gamma(a);

    let mut b = x - a + 1.0;
    let mut c = 1.0 / GAMMAINC_FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;

    for i in 1..=GAMMAINC_MAX_ITERS {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < GAMMAINC_FPMIN {
            d = GAMMAINC_FPMIN;
        }
        c = b + an / c;
        if c.abs() < GAMMAINC_FPMIN {
            c = GAMMAINC_FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < GAMMAINC_EPS {
            break;
        }
    }

    (log_prefactor.exp() * h).clamp(0.0, 1.0)
}

/// CDF of the Gamma distribution.
///
/// P(Λ <= x) where Λ ~ Gamma(α, β).
pub fn gamma_cdf(x: f64, alpha: f64, beta: f64) -> f64 {
    if x.is_nan() || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    if x.is_infinite() {
        return 1.0;
    }
    gamma_p(alpha, beta * x)
}

/// Inverse CDF (quantile) of Gamma(α, β).
///
/// Solves `gamma_cdf(x) = p` by bracketing and bisection on the standard
/// Gamma(α, 1) and rescaling by `1/β`. Returns 0 for `p <= 0` and
/// infinity for `p >= 1`.
pub fn gamma_inv_cdf(p: f64, alpha: f64, beta: f64) -> f64 {
    if p.is_nan() || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let mut low = 0.0;
    let mut high = alpha.max(1.0);
    let mut doublings = 0;
    while gamma_p(alpha, high) < p {
        low = high;
        high *= 2.0;
        doublings += 1;
        if doublings > GAMMA_INV_MAX_DOUBLINGS || !high.is_finite() {
            return f64::INFINITY;
        }
    }

    let mut mid = 0.5 * (low + high);
    for _ in 0..GAMMA_INV_MAX_ITERS {
        mid = 0.5 * (low + high);
        let cdf = gamma_p(alpha, mid);
        if cdf.is_nan() {
            return f64::NAN;
        }
        if cdf < p {
            low = mid;
        } else {
            high = mid;
        }
        if high - low <= GAMMA_INV_XTOL * high {
            break;
        }
    }
    mid / beta
}

/// Mean of Gamma(α, β).
///
/// E[Λ] = α / β
pub fn gamma_mean(alpha: f64, beta: f64) -> f64 {
    if alpha.is_nan() || beta.is_nan() || alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    alpha / beta
}

/// Mode of Gamma(α, β).
///
/// `(α - 1) / β` for α >= 1, else [`MODE_UNDEFINED`]. The sentinel is
/// returned for any α below 1, including non-positive shapes.
pub fn gamma_mode(alpha: f64, beta: f64) -> f64 {
    if alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha >= 1.0 {
        (alpha - 1.0) / beta
    } else {
        MODE_UNDEFINED
    }
}

/// Variance of Gamma(α, β).
///
/// Var[Λ] = α / β²
pub fn gamma_var(alpha: f64, beta: f64) -> f64 {
    if alpha.is_nan() || beta.is_nan() || alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    alpha / (beta * beta)
}
