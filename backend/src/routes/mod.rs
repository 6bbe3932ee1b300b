//! Route definitions for the Wildlife Prediction Service

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/predictions", prediction_routes())
        .nest("/sync", sync_routes())
        .route("/weather/:park_id", get(handlers::get_current_weather))
        .nest("/models", model_routes())
        .nest("/sightings", sighting_routes())
        .route("/parks/:park_id/status", get(handlers::get_park_status))
        .route("/history/:park_id", get(handlers::get_prediction_history))
}

/// Prediction read routes
fn prediction_routes() -> Router<AppState> {
    Router::new()
        .route("/:park_id", get(handlers::get_park_predictions))
        .route("/:park_id/:species", get(handlers::get_species_prediction))
}

/// Manual reconciliation triggers
fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/weather", post(handlers::sync_weather))
        .route("/predictions", post(handlers::sync_predictions))
        .route("/store", post(handlers::sync_store))
        .route("/status", get(handlers::get_sync_status))
}

/// Model metrics and retraining
fn model_routes() -> Router<AppState> {
    Router::new()
        .route("/:park_id", get(handlers::get_model_summaries))
        .route("/:park_id/retrain", post(handlers::retrain_park_models))
}

/// Sighting reports
fn sighting_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::record_sighting))
        .route("/:park_id", get(handlers::list_sightings))
}
