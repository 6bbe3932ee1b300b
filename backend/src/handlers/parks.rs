//! Park status and prediction history handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{ParkId, PredictionProvenance, SpeciesId};

use crate::error::{AppError, AppResult};
use crate::services::history::MAX_HISTORY_HOURS;
use crate::services::ActivityLevel;
use crate::AppState;

/// Current state of a park
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkStatus {
    pub park_id: ParkId,
    pub activity_level: ActivityLevel,
    pub recent_sightings_count: usize,
    pub predictions_available: bool,
    /// Generation time of the newest cached prediction
    pub last_updated: Option<DateTime<Utc>>,
}

/// Get activity and prediction availability for a park
pub async fn get_park_status(
    State(state): State<AppState>,
    Path(park_id): Path<String>,
) -> AppResult<Json<ParkStatus>> {
    let engine = &state.engine;
    let park_id = ParkId::new(park_id);
    engine.catalog.park_or_err(&park_id)?;

    let now = Utc::now();
    let (activity_level, recent_sightings_count) = engine.sightings.activity(&park_id, now);
    let cached = engine.cache.park(&park_id, now);

    Ok(Json(ParkStatus {
        activity_level,
        recent_sightings_count,
        predictions_available: !cached.is_empty(),
        last_updated: cached.iter().map(|p| p.generated_at).max(),
        park_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub species: SpeciesId,
    pub probability: f64,
    pub confidence: f64,
    pub provenance: PredictionProvenance,
    pub generated_at: DateTime<Utc>,
    pub model_version: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionHistoryResponse {
    pub park_id: ParkId,
    pub hours: i64,
    pub entries: Vec<HistoryEntry>,
}

/// Get predictions written for a park over the last N hours (default 24)
pub async fn get_prediction_history(
    State(state): State<AppState>,
    Path(park_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<PredictionHistoryResponse>> {
    let park_id = ParkId::new(park_id);
    state.engine.catalog.park_or_err(&park_id)?;

    let hours = query.hours.unwrap_or(24);
    if !(1..=MAX_HISTORY_HOURS).contains(&hours) {
        return Err(AppError::Validation {
            field: "hours".to_string(),
            message: format!("hours must be between 1 and {}", MAX_HISTORY_HOURS),
        });
    }

    let entries = state
        .engine
        .history
        .since(&park_id, hours, Utc::now())
        .into_iter()
        .map(|p| HistoryEntry {
            species: p.species_id,
            probability: p.probability,
            confidence: p.confidence,
            provenance: p.provenance,
            generated_at: p.generated_at,
            model_version: p.model_version,
        })
        .collect();

    Ok(Json(PredictionHistoryResponse {
        park_id,
        hours,
        entries,
    }))
}
