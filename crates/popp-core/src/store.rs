//! Durable storage for bucket rates.
//!
//! A record store persists one `{alpha, beta}` record per bucket key. The
//! YAML store keeps one file per bucket:
//!
//! ```text
//! <db_root>/<region>/<db_name>_<cycle>/<increment>/
//!     0.yaml        alpha: 3.1
//!     60.yaml       beta: 121.1
//! ```
//!
//! Files that do not look like records are skipped with a warning so one
//! damaged bucket never blocks loading the rest of a model.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use popp_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const RECORD_EXTENSION: &str = "yaml";

/// Persisted Gamma parameters of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub alpha: f64,
    pub beta: f64,
}

impl RateRecord {
    pub fn is_finite(&self) -> bool {
        self.alpha.is_finite() && self.beta.is_finite()
    }
}

/// Reject a record that could not be restored into a rate.
fn check_record(location: String, key: i64, record: &RateRecord) -> Result<()> {
    if record.is_finite() {
        return Ok(());
    }
    Err(Error::StoreCorrupted {
        location,
        message: format!("refusing non-finite record for bucket {}", key),
    })
}

/// Key/value persistence for bucket records.
pub trait RecordStore: fmt::Debug + Send {
    /// Write (or overwrite) the record for `key`.
    fn write(&self, key: i64, record: &RateRecord) -> Result<()>;

    /// Read every readable record, ordered by key.
    fn read_all(&self) -> Result<Vec<(i64, RateRecord)>>;

    /// Human-readable location for diagnostics.
    fn location(&self) -> String;
}

/// One YAML file per bucket under a directory.
#[derive(Debug, Clone)]
pub struct YamlRecordStore {
    dir: PathBuf,
}

impl YamlRecordStore {
    /// Store rooted at `dir`. The directory is created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        YamlRecordStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: i64) -> PathBuf {
        self.dir.join(format!("{}.{}", key, RECORD_EXTENSION))
    }

    fn read_record(path: &Path) -> Result<RateRecord> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

impl RecordStore for YamlRecordStore {
    fn write(&self, key: i64, record: &RateRecord) -> Result<()> {
        check_record(self.location(), key, record)?;
        fs::create_dir_all(&self.dir)?;
        let content = serde_yaml::to_string(record)?;

        // Write-then-rename keeps a half-written record from replacing a good one
        let path = self.record_path(key);
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, RECORD_EXTENSION));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<(i64, RateRecord)>> {
        if !self.dir.exists() {
            debug!(location = %self.dir.display(), "creating empty record store");
            fs::create_dir_all(&self.dir)?;
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir)?;

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let key = match path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i64>().ok())
            {
                Some(key) => key,
                None => {
                    warn!(path = %path.display(), "skipping record with non-numeric bucket key");
                    continue;
                }
            };

            match Self::read_record(&path) {
                Ok(record) if record.is_finite() => records.push((key, record)),
                Ok(_) => {
                    warn!(path = %path.display(), "skipping non-finite record");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable record");
                }
            }
        }

        records.sort_by_key(|(key, _)| *key);
        Ok(records)
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Shared in-memory record map.
///
/// Clones share the same map, so a test can keep a handle while a model
/// owns another and observe what it saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<BTreeMap<i64, RateRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, key: i64) -> Option<RateRecord> {
        self.lock().get(&key).copied()
    }

    /// Insert a record directly, bypassing any model.
    pub fn insert(&self, key: i64, record: RateRecord) {
        self.lock().insert(key, record);
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<i64, RateRecord>> {
        // The map holds plain values, so a poisoned lock is still consistent
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordStore for MemoryRecordStore {
    fn write(&self, key: i64, record: &RateRecord) -> Result<()> {
        check_record(self.location(), key, record)?;
        self.lock().insert(key, *record);
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<(i64, RateRecord)>> {
        Ok(self.lock().iter().map(|(k, v)| (*k, *v)).collect())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
