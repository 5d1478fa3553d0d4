//! Observation feeds: where per-region counts come from.
//!
//! The JSON feed reads one document shaped like
//!
//! ```json
//! { "kitchen": { "1700000000": 1, "1700000060": 0 }, "hall": {} }
//! ```
//!
//! Timestamps are epoch seconds (as JSON object keys), counts are
//! non-negative integers. A zero count is an observed absence and still
//! adds exposure to its bucket.

use std::collections::BTreeMap;
use std::path::Path;

use popp_common::{Error, RegionId, Result};

use crate::model::Observations;

/// Source of observed counts for a region.
pub trait ObservationFeed {
    /// Counts for `region` with timestamps in `[start, end)`.
    fn observations(&self, region: &RegionId, start: i64, end: i64) -> Result<Observations>;
}

/// Feed backed by a parsed JSON document.
#[derive(Debug, Clone, Default)]
pub struct JsonObservationFeed {
    regions: BTreeMap<String, Observations>,
}

impl JsonObservationFeed {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Feed(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| Error::Feed(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let regions: BTreeMap<String, Observations> = serde_json::from_str(content)
            .map_err(|e| Error::Feed(format!("invalid observation document: {}", e)))?;
        Ok(JsonObservationFeed { regions })
    }

    /// Regions present in the document.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }
}

impl From<BTreeMap<String, Observations>> for JsonObservationFeed {
    fn from(regions: BTreeMap<String, Observations>) -> Self {
        JsonObservationFeed { regions }
    }
}

impl ObservationFeed for JsonObservationFeed {
    fn observations(&self, region: &RegionId, start: i64, end: i64) -> Result<Observations> {
        Ok(self
            .regions
            .get(region.as_str())
            .map(|obs| {
                obs.range(start..end.max(start))
                    .map(|(t, c)| (*t, *c))
                    .collect()
            })
            .unwrap_or_default())
    }
}
