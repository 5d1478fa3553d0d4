//! Region identity.
//!
//! A region id names one independent rate model and also one directory
//! under the database root, so it must be a single non-empty path component.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one spatial region.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId(String);

impl RegionId {
    /// Validate and wrap a region identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let reason = if id.trim().is_empty() {
            Some("must not be empty")
        } else if id.contains('/') || id.contains('\\') {
            Some("must not contain path separators")
        } else if id == "." || id == ".." {
            Some("must not be a relative path component")
        } else if id.chars().any(char::is_control) {
            Some("must not contain control characters")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidRegion {
                id,
                reason: reason.to_string(),
            }),
            None => Ok(RegionId(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RegionId::new(s)
    }
}

impl TryFrom<String> for RegionId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        RegionId::new(s)
    }
}

impl From<RegionId> for String {
    fn from(id: RegionId) -> Self {
        id.0
    }
}

impl AsRef<str> for RegionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
