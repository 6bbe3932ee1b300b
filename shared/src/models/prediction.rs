//! Prediction models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ParkId, SpeciesId};
use crate::types::TimeOfDay;

/// How a prediction was produced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionProvenance {
    /// Model evaluated against live weather
    Live,
    /// Model evaluated against fallback weather
    Degraded,
    /// Static per-species prior, no model available
    Prior,
}

impl PredictionProvenance {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionProvenance::Live => "live",
            PredictionProvenance::Degraded => "degraded",
            PredictionProvenance::Prior => "prior",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "live" => Some(PredictionProvenance::Live),
            "degraded" => Some(PredictionProvenance::Degraded),
            "prior" => Some(PredictionProvenance::Prior),
            _ => None,
        }
    }
}

/// Sighting likelihood for one species in one park
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub park_id: ParkId,
    pub species_id: SpeciesId,
    /// Sighting probability (0-1)
    pub probability: f64,
    /// Confidence in the estimate (0-1), independent of the probability
    pub confidence: f64,
    pub best_time: TimeOfDay,
    pub best_location: String,
    pub advisory: String,
    pub generated_at: DateTime<Utc>,
    /// Version of the model state that produced this row (0 for priors)
    pub model_version: i64,
    pub provenance: PredictionProvenance,
}

impl Prediction {
    /// Whether `self` should replace `stored` (strictly newer generation)
    pub fn supersedes(&self, stored: &Prediction) -> bool {
        self.generated_at > stored.generated_at
    }
}

/// Summary of a fitted model, exposed for operators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSummary {
    pub park_id: ParkId,
    pub species_id: SpeciesId,
    pub version: i64,
    pub sample_count: usize,
    pub holdout_count: usize,
    /// Out-of-sample fit quality (0-1)
    pub fit_quality: f64,
    pub trained_at: DateTime<Utc>,
}
