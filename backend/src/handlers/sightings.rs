//! HTTP handlers for sighting reports

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use shared::{ParkId, Sighting, SightingReport};

use crate::error::AppResult;
use crate::AppState;

/// Record a sighting report
pub async fn record_sighting(
    State(state): State<AppState>,
    Json(report): Json<SightingReport>,
) -> AppResult<(StatusCode, Json<Sighting>)> {
    let sighting = state.engine.sightings.record(report, Utc::now())?;
    Ok((StatusCode::CREATED, Json(sighting)))
}

/// Sightings for a park, newest first
pub async fn list_sightings(
    State(state): State<AppState>,
    Path(park_id): Path<String>,
) -> AppResult<Json<Vec<Sighting>>> {
    let park_id = ParkId::new(park_id);
    Ok(Json(state.engine.sightings.list(&park_id)?))
}
