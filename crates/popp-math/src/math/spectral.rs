//! Spectral reconstruction of one-cycle signals.
//!
//! A cycle of rate estimates is decomposed with a discrete Fourier transform
//! and rebuilt from a handful of dominant components. This smooths
//! bucket-level noise while keeping the cyclic shape. Two selection
//! techniques are provided:
//!
//! - **BAM** (best amplitude): one transform, keep the `n` strongest bins.
//! - **AAM** (accumulated amplitude): repeatedly transform the residual,
//!   peel off the strongest non-DC wave, and merge repeated detections of
//!   the same bin into a single component.
//!
//! Samples must be in chronological order; nothing here sorts them.
//!
//! # Conventions
//!
//! - Only bins `[0, N/2)` are considered (conjugate symmetry of real input).
//! - Amplitudes are `|X_k| / N`, phases are `arg(X_k)`.
//! - Waves are evaluated at `N` evenly spaced positions covering `[0, N]`
//!   with both endpoints included (see [`sample_positions`]).

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;
use thiserror::Error;

/// Upper bound on the number of components a default reconstruction keeps.
pub const MAX_COMPONENTS: usize = 15;

/// Samples required per selected component in a default reconstruction.
pub const SAMPLES_PER_COMPONENT: usize = 10;

/// Errors from spectral reconstruction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpectralError {
    #[error("signal of {len} samples is too short to select any frequency")]
    NotEnoughSamples { len: usize },

    #[error("sample {index} is not finite ({value})")]
    NonFiniteSample { index: usize, value: f64 },
}

/// Result type for spectral operations.
pub type Result<T> = std::result::Result<T, SpectralError>;

/// Frequency selection technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technique {
    /// Strongest bins of a single transform.
    Bam,
    /// Greedy residual peeling with merging of repeated bins.
    #[default]
    Aam,
}

impl std::fmt::Display for Technique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Technique::Bam => write!(f, "bam"),
            Technique::Aam => write!(f, "aam"),
        }
    }
}

/// One sinusoidal component: `amplitude * cos(2π * frequency * x + phase)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub amplitude: f64,
    pub phase: f64,
    /// DFT bin index.
    pub frequency: usize,
}

impl Component {
    /// Value of this component's wave at position `x`.
    pub fn value_at(&self, x: f64) -> f64 {
        self.amplitude * (2.0 * PI * self.frequency as f64 * x + self.phase).cos()
    }
}

/// Tuning knobs for the accumulated-amplitude technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AamParams {
    /// How many detections of one bin may be merged into its component.
    pub max_addition: usize,
    /// Hard cap on peeling iterations.
    pub max_iteration: usize,
}

impl Default for AamParams {
    fn default() -> Self {
        Self {
            max_addition: 10,
            max_iteration: 1000,
        }
    }
}

/// Output of [`reconstruct`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// Sum of the selected components, one value per input sample.
    pub signal: Vec<f64>,
    /// What the selected components did not explain.
    pub residue: Vec<f64>,
    /// Selected components, in selection order.
    pub components: Vec<Component>,
}

/// Clamp every sample into `[low, high]`.
///
/// Unlike `f64::clamp` this never panics; with `low > high` a sample below
/// `low` becomes `low` and one above `high` becomes `high`.
pub fn rectify(signal: &[f64], low: f64, high: f64) -> Vec<f64> {
    signal
        .iter()
        .map(|&value| {
            if value < low {
                low
            } else if value > high {
                high
            } else {
                value
            }
        })
        .collect()
}

/// Number of components a default reconstruction of `len` samples keeps.
pub fn default_component_count(len: usize) -> usize {
    (len / SAMPLES_PER_COMPONENT).min(MAX_COMPONENTS)
}

/// Positions at which waves are evaluated: `len` points evenly spaced over
/// `[0, len]`, endpoints included.
pub fn sample_positions(len: usize) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![0.0],
        n => {
            let step = n as f64 / (n - 1) as f64;
            (0..n).map(|k| k as f64 * step).collect()
        }
    }
}

/// Forward DFT of a real signal (unnormalized).
pub fn forward_transform(signal: &[f64]) -> Vec<Complex<f64>> {
    ForwardPlan::new(signal.len()).transform(signal)
}

/// The `n` strongest components of a real signal's spectrum.
///
/// Uses bins `[0, N/2)` only. Ties on amplitude are broken by phase, then
/// by bin index, both descending.
pub fn top_n_frequencies(spectrum: &[Complex<f64>], n: usize) -> Vec<Component> {
    let len = spectrum.len();
    if len == 0 {
        return Vec::new();
    }
    let scale = len as f64;
    let mut candidates: Vec<Component> = spectrum[..len / 2]
        .iter()
        .enumerate()
        .map(|(frequency, bin)| Component {
            amplitude: bin.norm() / scale,
            phase: bin.arg(),
            frequency,
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.amplitude
            .partial_cmp(&a.amplitude)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.phase.partial_cmp(&a.phase).unwrap_or(Ordering::Equal))
            .then_with(|| b.frequency.cmp(&a.frequency))
    });
    candidates.truncate(n);
    candidates
}

/// Evaluate the sum of `components` over `len` sample positions.
pub fn synthesize(components: &[Component], len: usize) -> Vec<f64> {
    sample_positions(len)
        .into_iter()
        .map(|x| components.iter().map(|c| c.value_at(x)).sum())
        .collect()
}

/// BAM selection: the `n` strongest bins of one transform.
pub fn best_amplitude(signal: &[f64], n: usize) -> Vec<Component> {
    top_n_frequencies(&forward_transform(signal), n)
}

/// AAM selection.
///
/// Seeds the component set with the strongest bin of the signal (almost
/// always DC), then peels waves off the residual until `target` distinct
/// bins are collected or `params.max_iteration` is reached. Each iteration
/// takes the second strongest bin of the residual, falling back to the
/// strongest when the second is DC or missing. A repeated bin is merged
/// into its component (amplitudes summed, phase averaged by occurrence
/// count) until it has been seen `params.max_addition` times; later
/// detections are still subtracted but no longer merged.
///
/// Returns the components and the final residual.
pub fn accumulate_amplitude(
    signal: &[f64],
    target: usize,
    params: AamParams,
) -> (Vec<Component>, Vec<f64>) {
    let plan = ForwardPlan::new(signal.len());
    let positions = sample_positions(signal.len());
    let mut residual = signal.to_vec();

    let Some(seed) = top_n_frequencies(&plan.transform(&residual), 1)
        .into_iter()
        .next()
    else {
        return (Vec::new(), residual);
    };
    let mut components = vec![seed];
    let mut occurrences: HashMap<usize, usize> = HashMap::from([(seed.frequency, 1)]);

    let mut iterations = 0;
    while components.len() < target && iterations < params.max_iteration {
        iterations += 1;

        let candidates = top_n_frequencies(&plan.transform(&residual), 2);
        let chosen = match candidates.as_slice() {
            [] => break,
            [only] => *only,
            [first, second, ..] => {
                if second.frequency == 0 {
                    *first
                } else {
                    *second
                }
            }
        };

        for (value, &x) in residual.iter_mut().zip(&positions) {
            *value -= chosen.value_at(x);
        }

        match components
            .iter_mut()
            .find(|c| c.frequency == chosen.frequency)
        {
            None => {
                components.push(chosen);
                occurrences.insert(chosen.frequency, 1);
            }
            Some(existing) => {
                let seen = occurrences.entry(chosen.frequency).or_insert(1);
                if *seen < params.max_addition {
                    let weight = *seen as f64;
                    existing.amplitude += chosen.amplitude;
                    existing.phase = (weight * existing.phase + chosen.phase) / (weight + 1.0);
                    *seen += 1;
                }
            }
        }
    }

    (components, residual)
}

/// Reconstruct `signal` with the default component count
/// `min(N / 10, 15)` and default AAM parameters.
pub fn reconstruct(signal: &[f64], technique: Technique) -> Result<Reconstruction> {
    reconstruct_with(
        signal,
        technique,
        default_component_count(signal.len()),
        AamParams::default(),
    )
}

/// Reconstruct `signal` from at most `target` components.
///
/// Fails when the signal has fewer than two samples, contains a
/// non-finite sample, or `target` is zero.
pub fn reconstruct_with(
    signal: &[f64],
    technique: Technique,
    target: usize,
    params: AamParams,
) -> Result<Reconstruction> {
    if let Some((index, &value)) = signal.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(SpectralError::NonFiniteSample { index, value });
    }
    if target == 0 || signal.len() < 2 {
        return Err(SpectralError::NotEnoughSamples { len: signal.len() });
    }

    let reconstruction = match technique {
        Technique::Bam => {
            let components = best_amplitude(signal, target);
            let rebuilt = synthesize(&components, signal.len());
            let residue = signal.iter().zip(&rebuilt).map(|(s, r)| s - r).collect();
            Reconstruction {
                signal: rebuilt,
                residue,
                components,
            }
        }
        Technique::Aam => {
            let (components, residue) = accumulate_amplitude(signal, target, params);
            Reconstruction {
                signal: synthesize(&components, signal.len()),
                residue,
                components,
            }
        }
    };
    Ok(reconstruction)
}

/// A forward FFT planned once for a fixed length.
struct ForwardPlan {
    fft: Arc<dyn Fft<f64>>,
}

impl ForwardPlan {
    fn new(len: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            fft: planner.plan_fft_forward(len),
        }
    }

    fn transform(&self, signal: &[f64]) -> Vec<Complex<f64>> {
        let mut buf: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
        if !buf.is_empty() {
            self.fft.process(&mut buf);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine_signal(len: usize, level: f64, amplitude: f64, frequency: usize) -> Vec<f64> {
        (0..len)
            .map(|k| {
                level + amplitude * (2.0 * PI * frequency as f64 * k as f64 / len as f64).cos()
            })
            .collect()
    }

    // ==================== rectify ====================

    #[test]
    fn rectify_clamps_both_sides() {
        assert_eq!(rectify(&[-1.0, 0.5, 2.0], 0.0, 1.0), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn rectify_with_open_upper_bound() {
        let out = rectify(&[-3.0, 0.0, 0.0005, 7.5], 0.001, f64::INFINITY);
        assert_eq!(out, vec![0.001, 0.001, 0.001, 7.5]);
    }

    // ==================== counts and positions ====================

    #[test]
    fn default_component_count_scales_and_caps() {
        assert_eq!(default_component_count(0), 0);
        assert_eq!(default_component_count(9), 0);
        assert_eq!(default_component_count(10), 1);
        assert_eq!(default_component_count(120), 12);
        assert_eq!(default_component_count(1440), MAX_COMPONENTS);
    }

    #[test]
    fn sample_positions_cover_closed_interval() {
        let xs = sample_positions(5);
        assert_eq!(xs.len(), 5);
        assert_eq!(xs[0], 0.0);
        assert!((xs[4] - 5.0).abs() < 1e-12);
        assert!((xs[1] - 1.25).abs() < 1e-12);
        assert_eq!(sample_positions(1), vec![0.0]);
        assert!(sample_positions(0).is_empty());
    }

    // ==================== top_n_frequencies ====================

    #[test]
    fn top_n_uses_lower_half_only() {
        let spectrum = forward_transform(&cosine_signal(8, 1.0, 0.5, 1));
        let all = top_n_frequencies(&spectrum, 100);
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|c| c.frequency < 4));
    }

    #[test]
    fn top_n_normalizes_amplitude() {
        let spectrum = forward_transform(&[3.0; 20]);
        let top = top_n_frequencies(&spectrum, 1);
        assert_eq!(top[0].frequency, 0);
        assert!((top[0].amplitude - 3.0).abs() < 1e-12);
        assert!(top[0].phase.abs() < 1e-12);
    }

    #[test]
    fn top_n_orders_by_amplitude() {
        let spectrum = forward_transform(&cosine_signal(64, 4.0, 2.0, 5));
        let top = top_n_frequencies(&spectrum, 2);
        assert_eq!(top[0].frequency, 0);
        assert_eq!(top[1].frequency, 5);
        assert!((top[1].amplitude - 1.0).abs() < 1e-9);
    }

    #[test]
    fn top_n_breaks_amplitude_ties_by_index() {
        // All-zero spectrum: amplitudes and phases tie, highest index wins.
        let spectrum = vec![Complex::new(0.0, 0.0); 10];
        let top = top_n_frequencies(&spectrum, 2);
        assert_eq!(top[0].frequency, 4);
        assert_eq!(top[1].frequency, 3);
    }

    // ==================== reconstruct ====================

    #[test]
    fn too_short_signal_is_an_error() {
        let err = reconstruct(&[1.0; 9], Technique::Aam).unwrap_err();
        assert_eq!(err, SpectralError::NotEnoughSamples { len: 9 });
        assert!(reconstruct(&[], Technique::Bam).is_err());
    }

    #[test]
    fn explicit_zero_target_is_an_error() {
        let err =
            reconstruct_with(&[1.0; 50], Technique::Bam, 0, AamParams::default()).unwrap_err();
        assert_eq!(err, SpectralError::NotEnoughSamples { len: 50 });
    }

    #[test]
    fn non_finite_sample_is_an_error() {
        let mut signal = vec![1.0; 20];
        signal[7] = f64::NAN;
        let err = reconstruct(&signal, Technique::Aam).unwrap_err();
        assert!(matches!(err, SpectralError::NonFiniteSample { index: 7, .. }));
    }

    #[test]
    fn constant_signal_reconstructs_to_its_level() {
        let signal = vec![0.25; 48];
        for technique in [Technique::Bam, Technique::Aam] {
            let out = reconstruct(&signal, technique).unwrap();
            assert_eq!(out.signal.len(), signal.len());
            for value in &out.signal {
                assert!(
                    (value - 0.25).abs() < 1e-9,
                    "{} reconstruction drifted: {}",
                    technique,
                    value
                );
            }
        }
    }

    #[test]
    fn bam_finds_dc_and_cosine() {
        let signal = cosine_signal(100, 5.0, 2.0, 3);
        let out = reconstruct(&signal, Technique::Bam).unwrap();
        assert_eq!(out.components.len(), 10);
        assert_eq!(out.components[0].frequency, 0);
        assert!((out.components[0].amplitude - 5.0).abs() < 1e-9);
        assert_eq!(out.components[1].frequency, 3);
        assert!((out.components[1].amplitude - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bam_residue_is_signal_minus_reconstruction() {
        let signal = cosine_signal(40, 1.0, 0.5, 2);
        let out = reconstruct(&signal, Technique::Bam).unwrap();
        for ((s, r), e) in signal.iter().zip(&out.signal).zip(&out.residue) {
            assert!((s - r - e).abs() < 1e-12);
        }
    }

    #[test]
    fn aam_seeds_with_dc_then_peels_cosine() {
        let signal = cosine_signal(100, 5.0, 2.0, 3);
        let out = reconstruct(&signal, Technique::Aam).unwrap();
        assert_eq!(out.components[0].frequency, 0);
        assert_eq!(out.components[1].frequency, 3);
        assert!(out.components.len() <= default_component_count(signal.len()));
    }

    #[test]
    fn aam_is_deterministic() {
        let signal: Vec<f64> = (0..96)
            .map(|k| 0.2 + 0.1 * ((k * 7919) % 13) as f64 / 13.0)
            .collect();
        let a = reconstruct(&signal, Technique::Aam).unwrap();
        let b = reconstruct(&signal, Technique::Aam).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn aam_iteration_cap_returns_partial_set() {
        let signal = cosine_signal(100, 5.0, 2.0, 3);
        let params = AamParams {
            max_addition: 10,
            max_iteration: 0,
        };
        let out = reconstruct_with(&signal, Technique::Aam, 10, params).unwrap();
        assert_eq!(out.components.len(), 1);
        assert_eq!(out.components[0].frequency, 0);
        assert_eq!(out.residue, signal);
    }

    #[test]
    fn aam_without_merging_keeps_first_detection() {
        let signal = cosine_signal(100, 5.0, 2.0, 3);
        let params = AamParams {
            max_addition: 1,
            max_iteration: 1000,
        };
        let (components, _) = accumulate_amplitude(&signal, 10, params);
        let cosine = components.iter().find(|c| c.frequency == 3).unwrap();
        assert!((cosine.amplitude - 1.0).abs() < 1e-9);
    }
}
