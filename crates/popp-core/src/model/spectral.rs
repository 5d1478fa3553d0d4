//! Fourier-smoothed rate surface over a periodic model.
//!
//! After every change to the folded data the layer pulls one cycle of mean
//! estimates, reconstructs it from its dominant frequencies, floors the
//! result at [`SPECTRAL_FLOOR`] and re-injects each smoothed value as the
//! mean of a copy of the underlying bucket rate (keeping its `beta`, so the
//! credible bounds still reflect how much data the bucket has seen).

use std::collections::BTreeMap;

use popp_common::{Error, Result};
use popp_math::spectral::{self, Technique, SAMPLES_PER_COMPONENT};
use tracing::debug;

use crate::logging::{event_names, Stage};

use super::{
    bucket_of, bucket_range, Estimates, Estimator, Observations, PeriodicFolder, Rate, RateModel,
};

/// Smallest rate the smoothed surface may report.
pub const SPECTRAL_FLOOR: f64 = 0.001;

/// Periodic model plus a derived, never-persisted spectral rate surface.
#[derive(Debug)]
pub struct SpectralLayer {
    periodic: PeriodicFolder,
    spectral: BTreeMap<i64, Rate>,
    technique: Technique,
}

impl SpectralLayer {
    /// Wrap `periodic`, which must hold at least 10 buckets per cycle.
    pub fn new(periodic: PeriodicFolder) -> Result<Self> {
        let buckets = periodic.periodic_cycle() / periodic.increment();
        if buckets < SAMPLES_PER_COMPONENT as i64 {
            return Err(Error::InvalidModel(format!(
                "spectral model needs at least {} buckets per cycle, got {}",
                SAMPLES_PER_COMPONENT, buckets
            )));
        }
        Ok(SpectralLayer {
            periodic,
            spectral: BTreeMap::new(),
            technique: Technique::default(),
        })
    }

    /// Use `technique` for subsequent refreshes.
    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.technique = technique;
        self
    }

    pub fn technique(&self) -> Technique {
        self.technique
    }

    pub fn periodic(&self) -> &PeriodicFolder {
        &self.periodic
    }

    pub fn periodic_cycle(&self) -> i64 {
        self.periodic.periodic_cycle()
    }

    pub fn pivot(&self) -> Option<i64> {
        self.periodic.pivot()
    }

    /// Number of buckets on the smoothed surface.
    pub fn spectral_len(&self) -> usize {
        self.spectral.len()
    }

    pub fn retrieve_full_cycle(&self, estimator: Estimator) -> Estimates {
        let (start, end) = self.periodic.cycle_window();
        self.retrieve(start, end, estimator)
    }

    fn spectral_key(&self, t: i64) -> i64 {
        bucket_of(self.periodic.fold(t), self.increment())
    }

    /// Rebuild the smoothed surface from the current periodic means.
    pub fn refresh(&mut self) -> Result<()> {
        let (start, end) = self.periodic.cycle_window();
        let curve = self.periodic.retrieve(start, end, Estimator::Mean);
        let samples: Vec<f64> = curve.values().copied().collect();

        let rebuilt = spectral::reconstruct(&samples, self.technique)?;
        let smoothed = spectral::rectify(&rebuilt.signal, SPECTRAL_FLOOR, f64::INFINITY);

        let mut next = BTreeMap::new();
        for (t, value) in curve.keys().zip(smoothed) {
            let mut rate = self.periodic.get_at(*t);
            let beta = rate.beta();
            rate.set(value, Some(beta), false);
            next.insert(self.spectral_key(*t), rate);
        }

        debug!(
            event = event_names::REFRESH_DONE,
            stage = %Stage::Refresh,
            buckets = next.len(),
            components = rebuilt.components.len(),
            technique = %self.technique,
            "spectral surface refreshed"
        );
        self.spectral = next;
        Ok(())
    }
}

impl RateModel for SpectralLayer {
    fn increment(&self) -> i64 {
        self.periodic.increment()
    }

    fn get_at(&self, t: i64) -> Rate {
        self.spectral
            .get(&self.spectral_key(t))
            .copied()
            .unwrap_or_else(|| self.periodic.inner().default_rate())
    }

    fn set_at(&mut self, t: i64, rate: Rate) -> Result<()> {
        self.periodic.set_at(t, rate)?;
        self.refresh()
    }

    fn update(&mut self, observations: &Observations) -> Result<()> {
        self.periodic.update(observations)?;
        self.refresh()
    }

    fn retrieve(&self, start: i64, end: i64, estimator: Estimator) -> Estimates {
        bucket_range(start, end, self.increment())
            .map(|t| (t, self.get_at(t).estimate(estimator)))
            .collect()
    }

    fn save(&self) -> Result<usize> {
        self.periodic.save()
    }

    fn load(&mut self) -> Result<bool> {
        let found = self.periodic.load()?;
        if self.periodic.pivot().is_some() {
            self.refresh()?;
        }
        Ok(found)
    }
}
