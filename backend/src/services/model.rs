//! Per-(park, species) sighting models
//!
//! Each model is a ridge-regularized log-linear fit: the log of the observed
//! sighting rate regressed on standardized weather readings, one-hot
//! condition, viewing window and season, and the heat, cold and heavy-rain
//! bands. Fitted states are immutable and shared through `Arc`; a retrain
//! builds a new state off to the side and swaps it in whole.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use shared::{
    clamp_unit, FeatureVector, ModelSummary, ParkId, Prediction, PredictionProvenance, Season,
    SpeciesId, TimeOfDay, WeatherCondition,
};

use crate::catalog::{Catalog, SpeciesEntry};
use crate::error::{AppError, AppResult};
use crate::services::training::{TrainingSample, TrainingSet};

/// Confidence multiplier for predictions made from fallback weather
pub const DEGRADED_CONFIDENCE_FACTOR: f64 = 0.75;

/// Every fifth sample is held out for scoring
const HOLDOUT_STRIDE: usize = 5;
const MIN_TRAINING_SAMPLES: usize = 20;
const RIDGE_LAMBDA: f64 = 1.0;
const NUMERIC: usize = FeatureVector::NUMERIC_LEN;
/// intercept + numeric + condition + time of day + season + three bands
const DESIGN_LEN: usize = 1 + NUMERIC + 5 + 6 + 3 + 3;

type ModelKey = (ParkId, SpeciesId);

/// Fitted coefficients with the standardization they were fitted under
#[derive(Debug, Clone)]
pub struct ModelParameters {
    means: [f64; NUMERIC],
    scales: [f64; NUMERIC],
    coefficients: Vec<f64>,
}

impl ModelParameters {
    fn design_row(&self, features: &FeatureVector) -> [f64; DESIGN_LEN] {
        let mut row = [0.0; DESIGN_LEN];
        row[0] = 1.0;

        for (i, value) in features.numeric().iter().enumerate() {
            row[1 + i] = (value - self.means[i]) / self.scales[i];
        }

        let mut offset = 1 + NUMERIC;
        row[offset + features.condition.index()] = 1.0;
        offset += WeatherCondition::ALL.len();
        row[offset + features.time_of_day.index()] = 1.0;
        offset += TimeOfDay::ALL.len();
        row[offset + features.season.index()] = 1.0;
        offset += Season::ALL.len();

        if features.temperature_celsius > 35.0 {
            row[offset] = 1.0;
        }
        if features.temperature_celsius < 15.0 {
            row[offset + 1] = 1.0;
        }
        if features.precipitation_mm > 10.0 {
            row[offset + 2] = 1.0;
        }
        row
    }

    /// Sighting probability for the given conditions, within [0, 1]
    pub fn probability(&self, features: &FeatureVector) -> f64 {
        let row = self.design_row(features);
        let log_rate: f64 = row
            .iter()
            .zip(&self.coefficients)
            .map(|(x, w)| x * w)
            .sum();
        clamp_unit(log_rate.exp())
    }
}

/// Training outcome stored alongside the parameters
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub sample_count: usize,
    pub holdout_count: usize,
    /// Holdout R² in probability space, clamped to [0, 1]
    pub fit_quality: f64,
    pub trained_at: DateTime<Utc>,
}

/// A fitted model for one (park, species)
#[derive(Debug, Clone)]
pub struct ModelState {
    pub park_id: ParkId,
    pub species_id: SpeciesId,
    pub version: i64,
    pub parameters: ModelParameters,
    pub summary: TrainingSummary,
}

impl ModelState {
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            park_id: self.park_id.clone(),
            species_id: self.species_id.clone(),
            version: self.version,
            sample_count: self.summary.sample_count,
            holdout_count: self.summary.holdout_count,
            fit_quality: self.summary.fit_quality,
            trained_at: self.summary.trained_at,
        }
    }

    /// Confidence for predictions made from these features
    pub fn confidence(&self, features: &FeatureVector) -> f64 {
        let confidence = if features.is_degraded() {
            self.summary.fit_quality * DEGRADED_CONFIDENCE_FACTOR
        } else {
            self.summary.fit_quality
        };
        clamp_unit(confidence)
    }
}

// ============================================================================
// Fitting
// ============================================================================

/// Fit parameters on the training split and score them on the holdout split
pub fn fit(
    training: &TrainingSet,
    trained_at: DateTime<Utc>,
) -> AppResult<(ModelParameters, TrainingSummary)> {
    if training.len() < MIN_TRAINING_SAMPLES {
        return Err(AppError::ValidationError(format!(
            "at least {} training samples are required, got {}",
            MIN_TRAINING_SAMPLES,
            training.len()
        )));
    }

    let (fit_split, holdout): (Vec<_>, Vec<_>) = training
        .samples
        .iter()
        .enumerate()
        .partition(|(i, _)| i % HOLDOUT_STRIDE != HOLDOUT_STRIDE - 1);
    let fit_split: Vec<_> = fit_split.into_iter().map(|(_, s)| s).collect();
    let holdout: Vec<_> = holdout.into_iter().map(|(_, s)| s).collect();

    let n = fit_split.len() as f64;
    let mut means = [0.0; NUMERIC];
    let mut scales = [0.0; NUMERIC];
    for sample in &fit_split {
        for (i, value) in sample.features.numeric().iter().enumerate() {
            means[i] += value / n;
        }
    }
    for sample in &fit_split {
        for (i, value) in sample.features.numeric().iter().enumerate() {
            scales[i] += (value - means[i]).powi(2) / n;
        }
    }
    for scale in scales.iter_mut() {
        *scale = scale.sqrt();
        if *scale < 1e-9 {
            *scale = 1.0;
        }
    }

    let mut parameters = ModelParameters {
        means,
        scales,
        coefficients: vec![0.0; DESIGN_LEN],
    };

    // Normal equations: (XᵀX + λI) w = Xᵀy, intercept unpenalized
    let mut gram = vec![vec![0.0; DESIGN_LEN]; DESIGN_LEN];
    let mut moment = vec![0.0; DESIGN_LEN];
    for sample in &fit_split {
        let row = parameters.design_row(&sample.features);
        let target = sample.observed_rate.max(1e-6).ln();
        for i in 0..DESIGN_LEN {
            moment[i] += row[i] * target;
            for j in 0..DESIGN_LEN {
                gram[i][j] += row[i] * row[j];
            }
        }
    }
    for (i, gram_row) in gram.iter_mut().enumerate().skip(1) {
        gram_row[i] += RIDGE_LAMBDA;
    }

    parameters.coefficients = solve(gram, moment)?;

    let fit_quality = holdout_r2(&parameters, &holdout);

    Ok((
        parameters,
        TrainingSummary {
            sample_count: fit_split.len(),
            holdout_count: holdout.len(),
            fit_quality,
            trained_at,
        },
    ))
}

fn holdout_r2(parameters: &ModelParameters, holdout: &[&TrainingSample]) -> f64 {
    if holdout.is_empty() {
        return 0.0;
    }
    let mean = holdout.iter().map(|s| s.observed_rate).sum::<f64>() / holdout.len() as f64;
    let total: f64 = holdout.iter().map(|s| (s.observed_rate - mean).powi(2)).sum();
    let residual: f64 = holdout
        .iter()
        .map(|s| (s.observed_rate - parameters.probability(&s.features)).powi(2))
        .sum();

    if total < 1e-12 {
        return if residual < 1e-6 { 1.0 } else { 0.0 };
    }
    clamp_unit(1.0 - residual / total)
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> AppResult<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(AppError::Internal("model design matrix is singular".into()));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(AppError::Internal("model fit produced non-finite coefficients".into()));
    }
    Ok(x)
}

// ============================================================================
// Registry
// ============================================================================

/// Current model state per (park, species). Readers take an `Arc` snapshot
/// and never observe a partially trained state.
#[derive(Default)]
pub struct ModelRegistry {
    states: RwLock<HashMap<ModelKey, Arc<ModelState>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, park_id: &ParkId, species_id: &SpeciesId) -> Option<Arc<ModelState>> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(park_id.clone(), species_id.clone()))
            .cloned()
    }

    /// Swap in a freshly fitted state, assigning the next version
    pub fn install(
        &self,
        park_id: &ParkId,
        species_id: &SpeciesId,
        parameters: ModelParameters,
        summary: TrainingSummary,
    ) -> Arc<ModelState> {
        let key = (park_id.clone(), species_id.clone());
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        let version = states.get(&key).map(|s| s.version + 1).unwrap_or(1);

        let state = Arc::new(ModelState {
            park_id: park_id.clone(),
            species_id: species_id.clone(),
            version,
            parameters,
            summary,
        });
        states.insert(key, state.clone());
        state
    }

    pub fn remove(&self, park_id: &ParkId, species_id: &SpeciesId) -> Option<Arc<ModelState>> {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(park_id.clone(), species_id.clone()))
    }

    pub fn summaries(&self, park_id: &ParkId) -> Vec<ModelSummary> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        let mut summaries: Vec<_> = states
            .values()
            .filter(|s| &s.park_id == park_id)
            .map(|s| s.summary())
            .collect();
        summaries.sort_by(|a, b| a.species_id.cmp(&b.species_id));
        summaries
    }

    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Prediction model
// ============================================================================

/// Evaluates and retrains the per-(park, species) models
pub struct PredictionModel {
    catalog: Arc<Catalog>,
    registry: ModelRegistry,
}

impl PredictionModel {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            registry: ModelRegistry::new(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Evaluate the current model. Fails with `ModelNotReady` when the pair
    /// has never been trained and `PredictionUnavailable` when the species is
    /// not in the park's catalog.
    pub fn evaluate(
        &self,
        park_id: &ParkId,
        species_id: &SpeciesId,
        features: &FeatureVector,
        generated_at: DateTime<Utc>,
    ) -> AppResult<Prediction> {
        let entry = self.entry(park_id, species_id)?;
        let state = self
            .registry
            .snapshot(park_id, species_id)
            .ok_or_else(|| AppError::ModelNotReady {
                park: park_id.to_string(),
                species: species_id.to_string(),
            })?;
        Ok(evaluate_state(&state, &entry, features, generated_at))
    }

    /// Fit a new state and swap it in
    pub fn retrain(
        &self,
        park_id: &ParkId,
        species_id: &SpeciesId,
        training_set: &TrainingSet,
        trained_at: DateTime<Utc>,
    ) -> AppResult<Arc<ModelState>> {
        self.entry(park_id, species_id)?;
        let (parameters, summary) = fit(training_set, trained_at)?;
        Ok(self.install(park_id, species_id, parameters, summary))
    }

    /// Swap in parameters fitted elsewhere
    pub fn install(
        &self,
        park_id: &ParkId,
        species_id: &SpeciesId,
        parameters: ModelParameters,
        summary: TrainingSummary,
    ) -> Arc<ModelState> {
        let state = self.registry.install(park_id, species_id, parameters, summary);

        tracing::info!(
            park = %park_id,
            species = %species_id,
            version = state.version,
            fit_quality = state.summary.fit_quality,
            samples = state.summary.sample_count,
            "Model retrained"
        );
        state
    }

    fn entry(&self, park_id: &ParkId, species_id: &SpeciesId) -> AppResult<SpeciesEntry<'_>> {
        self.catalog.park_or_err(park_id)?;
        self.catalog
            .entry(park_id, species_id)
            .ok_or_else(|| AppError::PredictionUnavailable {
                park: park_id.to_string(),
                species: species_id.to_string(),
            })
    }
}

/// Pure evaluation of a snapshot
pub fn evaluate_state(
    state: &ModelState,
    entry: &SpeciesEntry<'_>,
    features: &FeatureVector,
    generated_at: DateTime<Utc>,
) -> Prediction {
    let provenance = if features.is_degraded() {
        PredictionProvenance::Degraded
    } else {
        PredictionProvenance::Live
    };

    Prediction {
        park_id: state.park_id.clone(),
        species_id: state.species_id.clone(),
        probability: state.parameters.probability(features),
        confidence: state.confidence(features),
        best_time: entry.profile.optimal_time,
        best_location: entry.in_park.best_location.clone(),
        advisory: advisory(entry, features, provenance),
        generated_at,
        model_version: state.version,
        provenance,
    }
}

/// Viewing advice for a prediction
pub fn advisory(
    entry: &SpeciesEntry<'_>,
    features: &FeatureVector,
    provenance: PredictionProvenance,
) -> String {
    let mut text = entry.profile.tips.clone();
    match provenance {
        PredictionProvenance::Degraded => {
            text.push_str(". Live weather is unavailable, so this estimate uses seasonal conditions")
        }
        PredictionProvenance::Prior => {
            text.push_str(". No trained model yet, showing the park's typical odds")
        }
        PredictionProvenance::Live => {}
    }
    if provenance != PredictionProvenance::Prior {
        if features.precipitation_mm > 10.0 {
            text.push_str(". Heavy rain is keeping animals under cover");
        } else if features.temperature_celsius > 35.0 {
            text.push_str(". Midday heat reduces activity, plan drives for cooler hours");
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::training::synthetic_training_set;
    use shared::WeatherProvenance;

    fn features(provenance: WeatherProvenance) -> FeatureVector {
        FeatureVector {
            temperature_celsius: 28.0,
            humidity_percent: 55.0,
            wind_speed_kmh: 10.0,
            precipitation_mm: 0.0,
            visibility_km: 10.0,
            pressure_hpa: 1013.0,
            condition: WeatherCondition::Sunny,
            time_of_day: TimeOfDay::Morning,
            season: Season::Dry,
            weather_provenance: provenance,
        }
    }

    #[test]
    fn test_solve_small_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let b = vec![3.0, 5.0];
        let x = solve(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-9);
        assert!((x[1] - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_solve_singular() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(a, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_fit_requires_samples() {
        let result = fit(&TrainingSet::default(), Utc::now());
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_versions_increase_per_key() {
        let model = PredictionModel::new(Arc::new(Catalog::default()));
        let park = ParkId::from("manyara");
        let species = SpeciesId::from("buffalos");
        let catalog = Catalog::default();
        let entry = catalog.entry(&park, &species).unwrap();
        let set = synthetic_training_set(&entry, 200).unwrap();

        let first = model.retrain(&park, &species, &set, Utc::now()).unwrap();
        let second = model.retrain(&park, &species, &set, Utc::now()).unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert!(second.summary.fit_quality > 0.5);
    }

    #[test]
    fn test_degraded_confidence_is_lower() {
        let model = PredictionModel::new(Arc::new(Catalog::default()));
        let park = ParkId::from("gombe");
        let species = SpeciesId::from("leopards");
        let catalog = Catalog::default();
        let entry = catalog.entry(&park, &species).unwrap();
        model
            .retrain(&park, &species, &synthetic_training_set(&entry, 400).unwrap(), Utc::now())
            .unwrap();

        let now = Utc::now();
        let live = model
            .evaluate(&park, &species, &features(WeatherProvenance::Live), now)
            .unwrap();
        let degraded = model
            .evaluate(&park, &species, &features(WeatherProvenance::Fallback), now)
            .unwrap();
        assert_eq!(live.provenance, PredictionProvenance::Live);
        assert_eq!(degraded.provenance, PredictionProvenance::Degraded);
        assert!(degraded.confidence <= live.confidence);
        assert_eq!(live.probability, degraded.probability);
    }

    #[test]
    fn test_untrained_and_unknown() {
        let model = PredictionModel::new(Arc::new(Catalog::default()));
        let f = features(WeatherProvenance::Live);
        let now = Utc::now();

        let err = model
            .evaluate(&ParkId::from("mikumi"), &SpeciesId::from("zebras"), &f, now)
            .unwrap_err();
        assert!(matches!(err, AppError::ModelNotReady { .. }));

        let err = model
            .evaluate(&ParkId::from("mikumi"), &SpeciesId::from("rhinos"), &f, now)
            .unwrap_err();
        assert!(matches!(err, AppError::PredictionUnavailable { .. }));

        let err = model
            .evaluate(&ParkId::from("kruger"), &SpeciesId::from("lions"), &f, now)
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownPark(_)));
    }
}
