//! Prediction read path
//!
//! Fast cache first, then the store, then an on-demand evaluation against
//! current weather. On-demand results are handed to the store writer in the
//! background; the caller does not wait for the write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{FeatureVector, ParkId, Prediction, PredictionProvenance, SpeciesId, TimeOfDay};

use crate::catalog::{Catalog, SpeciesEntry};
use crate::error::{AppError, AppResult};
use crate::services::model::{advisory, PredictionModel};
use crate::services::prediction_cache::PredictionCache;
use crate::services::prediction_store::PredictionStore;
use crate::services::store_writer::CommitSender;
use crate::services::weather_cache::WeatherCache;

const ON_DEMAND: &str = "on_demand";

/// Serves point-in-time prediction requests
#[derive(Clone)]
pub struct PredictionService {
    catalog: Arc<Catalog>,
    weather: Arc<WeatherCache>,
    model: Arc<PredictionModel>,
    store: Arc<dyn PredictionStore>,
    cache: Arc<PredictionCache>,
    commits: CommitSender,
}

impl PredictionService {
    pub fn new(
        catalog: Arc<Catalog>,
        weather: Arc<WeatherCache>,
        model: Arc<PredictionModel>,
        store: Arc<dyn PredictionStore>,
        cache: Arc<PredictionCache>,
        commits: CommitSender,
    ) -> Self {
        Self {
            catalog,
            weather,
            model,
            store,
            cache,
            commits,
        }
    }

    /// Prediction for one species
    pub async fn predict(
        &self,
        park_id: &ParkId,
        species_id: &SpeciesId,
        now: DateTime<Utc>,
    ) -> AppResult<Prediction> {
        let entry = self.entry(park_id, species_id)?;

        if let Some(cached) = self.cache.get(park_id, species_id, now) {
            return Ok(cached);
        }

        match self.store.latest(park_id, species_id).await {
            Ok(Some(stored)) if self.cache.is_fresh(&stored, now) => {
                self.cache.insert_if_newer(stored.clone());
                return Ok(stored);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    park = %park_id,
                    species = %species_id,
                    error = %e,
                    "Store read failed, evaluating on demand"
                );
            }
        }

        self.evaluate_on_demand(&entry, now).await
    }

    /// Predictions for every species in a park, ordered by species
    pub async fn predict_park(&self, park_id: &ParkId, now: DateTime<Utc>) -> AppResult<Vec<Prediction>> {
        let park = self.catalog.park_or_err(park_id)?;
        let mut predictions = Vec::with_capacity(park.species.len());
        for species_id in park.species.keys() {
            predictions.push(self.predict(park_id, species_id, now).await?);
        }
        Ok(predictions)
    }

    /// Static prior for a species at the given time
    pub fn static_prior(entry: &SpeciesEntry<'_>, now: DateTime<Utc>) -> Prediction {
        let time_of_day = TimeOfDay::at(now, entry.park.utc_offset_hours);
        Prediction {
            park_id: entry.park.id.clone(),
            species_id: entry.profile.id.clone(),
            probability: entry.static_prior(time_of_day),
            confidence: shared::clamp_unit(entry.profile.prior_confidence),
            best_time: entry.profile.optimal_time,
            best_location: entry.in_park.best_location.clone(),
            advisory: advisory_without_weather(entry),
            generated_at: now,
            model_version: 0,
            provenance: PredictionProvenance::Prior,
        }
    }

    async fn evaluate_on_demand(&self, entry: &SpeciesEntry<'_>, now: DateTime<Utc>) -> AppResult<Prediction> {
        let park_id = &entry.park.id;
        let species_id = &entry.profile.id;

        let observation = self.weather.get(park_id, now).await?;
        let features = FeatureVector::from_observation(&observation, entry.park.utc_offset_hours);

        match self.model.evaluate(park_id, species_id, &features, now) {
            Ok(prediction) => {
                self.write_back(prediction.clone());
                Ok(prediction)
            }
            Err(AppError::ModelNotReady { .. }) => {
                tracing::debug!(park = %park_id, species = %species_id, "No model yet, serving static prior");
                Ok(Self::static_prior(entry, now))
            }
            Err(e) => Err(e),
        }
    }

    fn write_back(&self, prediction: Prediction) {
        let commits = self.commits.clone();
        tokio::spawn(async move {
            let park = prediction.park_id.clone();
            let species = prediction.species_id.clone();
            if let Err(e) = commits.submit(prediction, ON_DEMAND).await {
                tracing::warn!(park = %park, species = %species, error = %e, "On-demand write-back dropped");
            }
        });
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

fn advisory_without_weather(entry: &SpeciesEntry<'_>) -> String {
    let placeholder = FeatureVector {
        temperature_celsius: entry.park.climate.base_temperature_celsius,
        humidity_percent: entry.park.climate.base_humidity_percent,
        wind_speed_kmh: 0.0,
        precipitation_mm: 0.0,
        visibility_km: 10.0,
        pressure_hpa: 1013.25,
        condition: entry.park.climate.typical_condition,
        time_of_day: entry.profile.optimal_time,
        season: shared::Season::Transition,
        weather_provenance: shared::WeatherProvenance::Fallback,
    };
    advisory(entry, &placeholder, PredictionProvenance::Prior)
}
