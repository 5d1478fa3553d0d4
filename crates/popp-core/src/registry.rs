//! Per-region fan-out over independent rate models.
//!
//! Every configured region owns one [`RegionModel`] backed by its own record
//! store. Operations run region by region; a failure in one region is
//! recorded in the [`BatchResult`] and the rest keep going.

use std::collections::BTreeMap;
use std::fmt;

use popp_common::{BatchResult, Error, RegionId, Result};
use popp_config::ModelConfig;
use serde::{Deserialize, Serialize};

use crate::feed::ObservationFeed;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::model::{Estimates, Estimator, RateModel, RegionModel};
use crate::store::{RecordStore, YamlRecordStore};

/// Outcome of learning one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnReport {
    pub region: RegionId,
    /// Observations taken from the feed.
    pub observations: usize,
    /// Bucket records written back to the store.
    pub buckets_saved: usize,
}

impl fmt::Display for LearnReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} observations, {} buckets saved",
            self.region, self.observations, self.buckets_saved
        )
    }
}

/// The rate models of every configured region.
#[derive(Debug)]
pub struct RegionRegistry {
    models: BTreeMap<RegionId, RegionModel>,
}

impl RegionRegistry {
    /// Build one model per region, each persisted under its own
    /// [`ModelConfig::store_location`].
    pub fn open(config: &ModelConfig, regions: &[RegionId]) -> Result<Self> {
        Self::with_stores(config, regions, |region| {
            Box::new(YamlRecordStore::new(config.store_location(region)))
        })
    }

    /// Build one model per region with stores produced by `store_for`.
    pub fn with_stores<F>(
        config: &ModelConfig,
        regions: &[RegionId],
        mut store_for: F,
    ) -> Result<Self>
    where
        F: FnMut(&RegionId) -> Box<dyn RecordStore>,
    {
        let mut models = BTreeMap::new();
        for region in regions {
            let model = RegionModel::build(
                config.model,
                config.technique,
                config.increment,
                config.periodic_cycle,
                store_for(region),
            )?;
            models.insert(region.clone(), model);
        }
        Ok(RegionRegistry { models })
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionId> {
        self.models.keys()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, region: &RegionId) -> Result<&RegionModel> {
        self.models.get(region).ok_or_else(|| unknown(region))
    }

    pub fn get_mut(&mut self, region: &RegionId) -> Result<&mut RegionModel> {
        self.models.get_mut(region).ok_or_else(|| unknown(region))
    }

    /// Restore every region from its store.
    ///
    /// Succeeded items are the regions that found records; regions with an
    /// empty store are neither successes nor failures.
    pub fn load_all(&mut self, ctx: &LogContext) -> BatchResult<RegionId> {
        let mut result = BatchResult::default();
        for (region, model) in self.models.iter_mut() {
            match model.load() {
                Ok(true) => {
                    log_event!(
                        ctx,
                        INFO,
                        event_names::LOAD_REGION_DONE,
                        Stage::Load,
                        "region restored",
                        region = %region,
                        location = %model.location()
                    );
                    result.add_success(region.clone());
                }
                Ok(false) => {
                    log_event!(
                        ctx,
                        DEBUG,
                        event_names::LOAD_REGION_EMPTY,
                        Stage::Load,
                        "no records for region",
                        region = %region
                    );
                }
                Err(e) => {
                    log_event!(
                        ctx,
                        WARN,
                        event_names::LOAD_REGION_FAILED,
                        Stage::Load,
                        "failed to restore region",
                        region = %region,
                        error = %e
                    );
                    result.add_failure(region.as_str(), &e);
                }
            }
        }
        result
    }

    /// Feed `[start, end)` of every region's observations into its model
    /// and persist the result.
    pub fn learn(
        &mut self,
        ctx: &LogContext,
        feed: &dyn ObservationFeed,
        start: i64,
        end: i64,
    ) -> BatchResult<LearnReport> {
        log_event!(
            ctx,
            INFO,
            event_names::LEARN_STARTED,
            Stage::Learn,
            "learning regions",
            regions = self.models.len(),
            start,
            end
        );

        let mut result = BatchResult::default();
        for (region, model) in self.models.iter_mut() {
            match learn_region(feed, region, model, start, end) {
                Ok(report) => {
                    log_event!(
                        ctx,
                        INFO,
                        event_names::LEARN_REGION_DONE,
                        Stage::Learn,
                        "region learned",
                        region = %region,
                        observations = report.observations,
                        buckets_saved = report.buckets_saved
                    );
                    result.add_success(report);
                }
                Err(e) => {
                    log_event!(
                        ctx,
                        WARN,
                        event_names::LEARN_REGION_FAILED,
                        Stage::Learn,
                        "region failed to learn",
                        region = %region,
                        error = %e
                    );
                    result.add_failure(region.as_str(), &e);
                }
            }
        }

        log_event!(
            ctx,
            INFO,
            event_names::LEARN_FINISHED,
            Stage::Learn,
            "learning finished",
            succeeded = result.summary.succeeded,
            failed = result.summary.failed
        );
        result
    }

    /// One full cycle of estimates for `region`.
    pub fn retrieve_full_cycle(
        &self,
        region: &RegionId,
        estimator: Estimator,
    ) -> Result<Estimates> {
        Ok(self.get(region)?.retrieve_full_cycle(estimator))
    }
}

fn learn_region(
    feed: &dyn ObservationFeed,
    region: &RegionId,
    model: &mut RegionModel,
    start: i64,
    end: i64,
) -> Result<LearnReport> {
    let observations = feed.observations(region, start, end)?;
    model.update(&observations)?;
    let buckets_saved = model.save()?;
    Ok(LearnReport {
        region: region.clone(),
        observations: observations.len(),
        buckets_saved,
    })
}

fn unknown(region: &RegionId) -> Error {
    Error::UnknownRegion {
        region: region.to_string(),
    }
}
