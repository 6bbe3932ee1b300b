//! HTTP handlers for prediction endpoints

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{ParkId, Prediction, PredictionProvenance, SpeciesId, TimeOfDay};

use crate::error::AppResult;
use crate::AppState;

/// One species entry as served to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesPredictionView {
    pub species: SpeciesId,
    pub probability: f64,
    pub confidence: f64,
    pub optimal_time: TimeOfDay,
    pub best_location: String,
    pub tips: String,
    pub provenance: PredictionProvenance,
    pub generated_at: DateTime<Utc>,
    pub model_version: i64,
    pub recent_sightings: usize,
}

/// All predictions for a park
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkPredictionsResponse {
    pub park_id: ParkId,
    pub generated_at: DateTime<Utc>,
    /// Mean confidence across the park's species
    pub confidence_score: f64,
    pub predictions: BTreeMap<SpeciesId, SpeciesPredictionView>,
}

fn view(state: &AppState, prediction: Prediction, now: DateTime<Utc>) -> SpeciesPredictionView {
    let recent_sightings = state
        .engine
        .sightings
        .recent_count(&prediction.park_id, &prediction.species_id, now);

    SpeciesPredictionView {
        species: prediction.species_id,
        probability: prediction.probability,
        confidence: prediction.confidence,
        optimal_time: prediction.best_time,
        best_location: prediction.best_location,
        tips: prediction.advisory,
        provenance: prediction.provenance,
        generated_at: prediction.generated_at,
        model_version: prediction.model_version,
        recent_sightings,
    }
}

/// Predictions for every species in a park
pub async fn get_park_predictions(
    State(state): State<AppState>,
    Path(park_id): Path<String>,
) -> AppResult<Json<ParkPredictionsResponse>> {
    let park_id = ParkId::new(park_id);
    let now = Utc::now();
    let predictions = state.engine.predictions.predict_park(&park_id, now).await?;

    let confidence_score = if predictions.is_empty() {
        0.0
    } else {
        predictions.iter().map(|p| p.confidence).sum::<f64>() / predictions.len() as f64
    };

    let predictions = predictions
        .into_iter()
        .map(|p| (p.species_id.clone(), view(&state, p, now)))
        .collect();

    Ok(Json(ParkPredictionsResponse {
        park_id,
        generated_at: now,
        confidence_score,
        predictions,
    }))
}

/// Prediction for a single species
pub async fn get_species_prediction(
    State(state): State<AppState>,
    Path((park_id, species_id)): Path<(String, String)>,
) -> AppResult<Json<SpeciesPredictionView>> {
    let park_id = ParkId::new(park_id);
    let species_id = SpeciesId::new(species_id);
    let now = Utc::now();
    let prediction = state
        .engine
        .predictions
        .predict(&park_id, &species_id, now)
        .await?;
    Ok(Json(view(&state, prediction, now)))
}
