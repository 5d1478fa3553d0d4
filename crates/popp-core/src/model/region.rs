//! Per-region choice between the periodic and spectral models.

use popp_common::Result;
use popp_math::spectral::Technique;

use super::{
    Estimates, Estimator, ModelKind, Observations, PeriodicFolder, Rate, RateModel,
    SpectralLayer, TimeBucketStore,
};
use crate::store::RecordStore;

/// The rate model one region runs.
#[derive(Debug)]
pub enum RegionModel {
    Periodic(PeriodicFolder),
    Spectral(SpectralLayer),
}

impl RegionModel {
    /// Build the model stack for `kind` over `store`. `technique` only
    /// matters for spectral models.
    pub fn build(
        kind: ModelKind,
        technique: Technique,
        increment: i64,
        periodic_cycle: i64,
        store: Box<dyn RecordStore>,
    ) -> Result<Self> {
        let inner = TimeBucketStore::new(increment, store)?;
        let periodic = PeriodicFolder::new(inner, periodic_cycle)?;
        Ok(match kind {
            ModelKind::Periodic => RegionModel::Periodic(periodic),
            ModelKind::Spectral => {
                RegionModel::Spectral(SpectralLayer::new(periodic)?.with_technique(technique))
            }
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            RegionModel::Periodic(_) => ModelKind::Periodic,
            RegionModel::Spectral(_) => ModelKind::Spectral,
        }
    }

    /// Frequency selection of a spectral model.
    pub fn technique(&self) -> Option<Technique> {
        match self {
            RegionModel::Periodic(_) => None,
            RegionModel::Spectral(m) => Some(m.technique()),
        }
    }

    pub fn periodic_cycle(&self) -> i64 {
        match self {
            RegionModel::Periodic(m) => m.periodic_cycle(),
            RegionModel::Spectral(m) => m.periodic_cycle(),
        }
    }

    pub fn pivot(&self) -> Option<i64> {
        match self {
            RegionModel::Periodic(m) => m.pivot(),
            RegionModel::Spectral(m) => m.pivot(),
        }
    }

    /// Where the region's records are persisted.
    pub fn location(&self) -> String {
        self.periodic().inner().location()
    }

    /// The folded raw model, for both kinds.
    pub fn periodic(&self) -> &PeriodicFolder {
        match self {
            RegionModel::Periodic(m) => m,
            RegionModel::Spectral(m) => m.periodic(),
        }
    }

    pub fn retrieve_full_cycle(&self, estimator: Estimator) -> Estimates {
        match self {
            RegionModel::Periodic(m) => m.retrieve_full_cycle(estimator),
            RegionModel::Spectral(m) => m.retrieve_full_cycle(estimator),
        }
    }
}

impl RateModel for RegionModel {
    fn increment(&self) -> i64 {
        match self {
            RegionModel::Periodic(m) => m.increment(),
            RegionModel::Spectral(m) => m.increment(),
        }
    }

    fn get_at(&self, t: i64) -> Rate {
        match self {
            RegionModel::Periodic(m) => m.get_at(t),
            RegionModel::Spectral(m) => m.get_at(t),
        }
    }

    fn set_at(&mut self, t: i64, rate: Rate) -> Result<()> {
        match self {
            RegionModel::Periodic(m) => m.set_at(t, rate),
            RegionModel::Spectral(m) => m.set_at(t, rate),
        }
    }

    fn update(&mut self, observations: &Observations) -> Result<()> {
        match self {
            RegionModel::Periodic(m) => m.update(observations),
            RegionModel::Spectral(m) => m.update(observations),
        }
    }

    fn retrieve(&self, start: i64, end: i64, estimator: Estimator) -> Estimates {
        match self {
            RegionModel::Periodic(m) => m.retrieve(start, end, estimator),
            RegionModel::Spectral(m) => m.retrieve(start, end, estimator),
        }
    }

    fn save(&self) -> Result<usize> {
        match self {
            RegionModel::Periodic(m) => m.save(),
            RegionModel::Spectral(m) => m.save(),
        }
    }

    fn load(&mut self) -> Result<bool> {
        match self {
            RegionModel::Periodic(m) => m.load(),
            RegionModel::Spectral(m) => m.load(),
        }
    }
}
