//! HTTP handler for current park weather

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use shared::{ParkId, WeatherObservation};

use crate::error::AppResult;
use crate::AppState;

/// Current observation for a park, served through the weather cache
pub async fn get_current_weather(
    State(state): State<AppState>,
    Path(park_id): Path<String>,
) -> AppResult<Json<WeatherObservation>> {
    let park_id = ParkId::new(park_id);
    let observation = state.engine.weather.get(&park_id, Utc::now()).await?;
    Ok(Json(observation))
}
