//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::services::scheduler::{JobCounts, SyncStatus};
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: String,
    pub store_backend: String,
    pub trained_models: usize,
    pub cached_predictions: usize,
    pub pending_writes: usize,
    pub jobs: JobCounts,
    pub last_sync: Vec<SyncStatus>,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = &state.engine;
    let (backend, reachable) = engine.store.health().await;
    let database = if reachable { "connected" } else { "disconnected" };

    Json(HealthResponse {
        status: if reachable { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        database: database.to_string(),
        store_backend: backend.to_string(),
        trained_models: engine.model.registry().len(),
        cached_predictions: engine.cache.len(),
        pending_writes: engine.scheduler.pending().len(),
        jobs: engine.scheduler.jobs().counts(),
        last_sync: engine.scheduler.sync_status(),
    })
}
