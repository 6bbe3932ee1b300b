//! Park and species identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::GpsCoordinates;

/// National park identifier, e.g. `serengeti`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParkId(String);

impl ParkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParkId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Species identifier, e.g. `lions`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(String);

impl SpeciesId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpeciesId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A park location. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: ParkId,
    pub name: String,
    pub coordinates: GpsCoordinates,
    /// Offset from UTC used for time-of-day and season bucketing
    pub utc_offset_hours: i32,
}
