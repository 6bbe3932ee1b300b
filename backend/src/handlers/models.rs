//! HTTP handlers for model metrics and manual retraining

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use shared::{ModelSummary, ParkId};

use crate::error::AppResult;
use crate::services::scheduler::CycleReport;
use crate::AppState;

/// Model summaries for every trained species in a park
pub async fn get_model_summaries(
    State(state): State<AppState>,
    Path(park_id): Path<String>,
) -> AppResult<Json<Vec<ModelSummary>>> {
    let park_id = ParkId::new(park_id);
    state.engine.catalog.park_or_err(&park_id)?;
    Ok(Json(state.engine.model.registry().summaries(&park_id)))
}

/// Retrain every species of a park and report per-species outcomes
pub async fn retrain_park_models(
    State(state): State<AppState>,
    Path(park_id): Path<String>,
) -> AppResult<Json<CycleReport>> {
    let park_id = ParkId::new(park_id);
    let report = state.engine.scheduler.retrain_park(&park_id, Utc::now()).await?;
    Ok(Json(report))
}
