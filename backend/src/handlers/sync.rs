//! Manual reconciliation triggers and sync status
//!
//! Each trigger starts a cycle in the background and answers 202 at once.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppResult;
use crate::services::scheduler::SyncStatus;
use crate::services::JobClass;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SyncAccepted {
    pub message: String,
    pub job: JobClass,
}

type Accepted = AppResult<(StatusCode, Json<SyncAccepted>)>;

fn trigger(state: &AppState, class: JobClass) -> Accepted {
    state.engine.trigger(class)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SyncAccepted {
            message: format!("{} cycle started", class.as_str()),
            job: class,
        }),
    ))
}

pub async fn sync_weather(State(state): State<AppState>) -> Accepted {
    trigger(&state, JobClass::WeatherRefresh)
}

pub async fn sync_predictions(State(state): State<AppState>) -> Accepted {
    trigger(&state, JobClass::PredictionRefresh)
}

pub async fn sync_store(State(state): State<AppState>) -> Accepted {
    trigger(&state, JobClass::StoreSync)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub timestamp: DateTime<Utc>,
    pub store_backend: String,
    pub database_connected: bool,
    pub pending_writes: usize,
    /// Last finished cycle per job class; classes that never ran are absent
    pub jobs: Vec<SyncStatus>,
}

/// Get the last cycle of each job class
pub async fn get_sync_status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    let engine = &state.engine;
    let (backend, reachable) = engine.store.health().await;

    Json(SyncStatusResponse {
        timestamp: Utc::now(),
        store_backend: backend.to_string(),
        database_connected: reachable,
        pending_writes: engine.scheduler.pending().len(),
        jobs: engine.scheduler.sync_status(),
    })
}
