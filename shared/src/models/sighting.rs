//! Wildlife sighting reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validation::validate_identifier;

/// Who reported a sighting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReporterType {
    Ranger,
    Guide,
    Tourist,
    Researcher,
}

/// Incoming sighting report
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SightingReport {
    #[validate(custom = "validate_identifier")]
    pub park_id: String,

    #[validate(custom = "validate_identifier")]
    pub species_id: String,

    #[validate(length(min = 1, max = 200))]
    pub sighting_location: String,

    pub sighting_time: DateTime<Utc>,

    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,

    pub reporter_type: ReporterType,

    #[validate(range(min = 1, max = 5000))]
    pub group_size: Option<u32>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// A stored sighting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sighting {
    pub id: Uuid,
    pub park_id: String,
    pub species_id: String,
    pub sighting_location: String,
    pub sighting_time: DateTime<Utc>,
    pub confidence: f64,
    pub reporter_type: ReporterType,
    pub group_size: Option<u32>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Sighting {
    pub fn from_report(report: SightingReport, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            park_id: report.park_id.trim().to_lowercase(),
            species_id: report.species_id.trim().to_lowercase(),
            sighting_location: report.sighting_location,
            sighting_time: report.sighting_time,
            confidence: report.confidence,
            reporter_type: report.reporter_type,
            group_size: report.group_size,
            notes: report.notes,
            recorded_at,
        }
    }
}
