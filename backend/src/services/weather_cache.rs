//! Time-bounded weather cache with seasonal fallback
//!
//! Observations are keyed by (park, hour bucket). Concurrent misses on the
//! same key share one provider call. Provider failures never reach callers:
//! a deterministic observation is synthesized from the park's climate profile
//! and cached for a shorter time.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use shared::{local_time, ParkId, Season, WeatherCondition, WeatherObservation, WeatherProvenance};
use tokio::sync::OnceCell;

use crate::catalog::{Catalog, ClimateProfile, ParkProfile};
use crate::config::WeatherConfig;
use crate::error::{AppError, AppResult};
use crate::external::WeatherProvider;

type SlotKey = (ParkId, i64);
type Slot = Arc<OnceCell<WeatherObservation>>;

/// Cache lifetimes and provider budget
#[derive(Debug, Clone, Copy)]
pub struct WeatherCacheSettings {
    pub ttl: Duration,
    pub fallback_ttl: Duration,
    pub timeout: Duration,
}

impl From<&WeatherConfig> for WeatherCacheSettings {
    fn from(config: &WeatherConfig) -> Self {
        Self {
            ttl: config.cache_ttl(),
            fallback_ttl: config.fallback_ttl(),
            timeout: config.timeout(),
        }
    }
}

/// Weather cache shared by the request path and the scheduler
pub struct WeatherCache {
    provider: Arc<dyn WeatherProvider>,
    catalog: Arc<Catalog>,
    settings: WeatherCacheSettings,
    slots: Mutex<HashMap<SlotKey, Slot>>,
}

impl WeatherCache {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        catalog: Arc<Catalog>,
        settings: WeatherCacheSettings,
    ) -> Self {
        Self {
            provider,
            catalog,
            settings,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Current observation for a park. Served from cache while fresh,
    /// otherwise fetched once for all concurrent callers.
    pub async fn get(&self, park_id: &ParkId, now: DateTime<Utc>) -> AppResult<WeatherObservation> {
        let park = self.catalog.park_or_err(park_id)?;
        let slot = self.slot(park_id, now, false);
        Ok(self.resolve(slot, park, now).await)
    }

    /// Force a new fetch for the current bucket. An in-flight fetch for the
    /// same key is joined rather than duplicated.
    pub async fn refresh(&self, park_id: &ParkId, now: DateTime<Utc>) -> AppResult<WeatherObservation> {
        let park = self.catalog.park_or_err(park_id)?;
        let slot = self.slot(park_id, now, true);
        Ok(self.resolve(slot, park, now).await)
    }

    /// Fresh cached observation, without fetching
    pub fn peek(&self, park_id: &ParkId, now: DateTime<Utc>) -> Option<WeatherObservation> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&(park_id.clone(), hour_bucket(now)))
            .and_then(|slot| slot.get())
            .filter(|observation| self.is_fresh(observation, now))
            .cloned()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|_, slot| match slot.get() {
            Some(observation) => self.is_fresh(observation, now),
            None => true,
        });
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, park_id: &ParkId, now: DateTime<Utc>, force: bool) -> Slot {
        let key = (park_id.clone(), hour_bucket(now));
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(slot) = slots.get(&key) {
            match slot.get() {
                // in flight: join it
                None => return slot.clone(),
                Some(observation) if !force && self.is_fresh(observation, now) => {
                    return slot.clone()
                }
                Some(_) => {}
            }
        }

        let slot: Slot = Arc::new(OnceCell::new());
        slots.insert(key, slot.clone());
        slot
    }

    async fn resolve(&self, slot: Slot, park: &ParkProfile, now: DateTime<Utc>) -> WeatherObservation {
        slot.get_or_init(|| self.fetch(park, now)).await.clone()
    }

    async fn fetch(&self, park: &ParkProfile, now: DateTime<Utc>) -> WeatherObservation {
        let location = park.location();
        let outcome = tokio::time::timeout(self.settings.timeout, self.provider.current(&location, now))
            .await
            .unwrap_or_else(|_| {
                Err(AppError::UpstreamUnavailable(format!(
                    "no response within {:?}",
                    self.settings.timeout
                )))
            });

        match outcome {
            Ok(observation) => {
                tracing::debug!(park = %park.id, at = %now, "Live weather cached");
                observation
            }
            Err(e) => {
                tracing::warn!(
                    park = %park.id,
                    at = %now,
                    error = %e,
                    "Weather provider failed, serving seasonal fallback"
                );
                fallback_observation(park, now)
            }
        }
    }

    fn is_fresh(&self, observation: &WeatherObservation, now: DateTime<Utc>) -> bool {
        let ttl = if observation.is_live() {
            self.settings.ttl
        } else {
            self.settings.fallback_ttl
        };
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        now - observation.timestamp < ttl
    }
}

fn hour_bucket(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(3600)
}

// ============================================================================
// Seasonal fallback
// ============================================================================

/// Ranges a synthesized observation stays within for a given month
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackBounds {
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    pub condition: WeatherCondition,
    pub precipitation_mm: f64,
}

impl FallbackBounds {
    pub fn contains(&self, observation: &WeatherObservation) -> bool {
        (self.temperature_min..=self.temperature_max).contains(&observation.temperature_celsius)
            && (self.humidity_min..=self.humidity_max).contains(&observation.humidity_percent)
            && observation.condition == self.condition
    }
}

/// Monthly fallback ranges for a climate profile
pub fn fallback_bounds(climate: &ClimateProfile, month: u32) -> FallbackBounds {
    let (temperature_shift, humidity_shift, condition, precipitation_mm) =
        match Season::from_month(month) {
            Season::Wet => (-2.0, 12.0, WeatherCondition::Rainy, 4.0),
            Season::Dry => (1.0, -10.0, climate.typical_condition, 0.0),
            Season::Transition => (2.0, 0.0, WeatherCondition::PartlyCloudy, 1.0),
        };

    let temperature = climate.base_temperature_celsius + temperature_shift;
    let humidity = climate.base_humidity_percent + humidity_shift;

    FallbackBounds {
        temperature_min: temperature - climate.temperature_spread,
        temperature_max: temperature + climate.temperature_spread,
        humidity_min: (humidity - climate.humidity_spread).clamp(0.0, 100.0),
        humidity_max: (humidity + climate.humidity_spread).clamp(0.0, 100.0),
        condition,
        precipitation_mm,
    }
}

/// Deterministic observation from the park's climate profile. Follows a
/// daily cycle peaking mid-afternoon.
pub fn fallback_observation(park: &ParkProfile, now: DateTime<Utc>) -> WeatherObservation {
    let local = local_time(now, park.utc_offset_hours);
    let bounds = fallback_bounds(&park.climate, local.month());

    let hour = local.hour() as f64 + local.minute() as f64 / 60.0;
    let phase = ((hour - 15.0) * PI / 12.0).cos();

    let temperature_mid = (bounds.temperature_min + bounds.temperature_max) / 2.0;
    let temperature_half = (bounds.temperature_max - bounds.temperature_min) / 2.0;
    let humidity_mid = (bounds.humidity_min + bounds.humidity_max) / 2.0;
    let humidity_half = (bounds.humidity_max - bounds.humidity_min) / 2.0;

    WeatherObservation {
        location_id: park.id.clone(),
        timestamp: now,
        temperature_celsius: (temperature_mid + 0.9 * temperature_half * phase)
            .clamp(bounds.temperature_min, bounds.temperature_max),
        humidity_percent: (humidity_mid - 0.9 * humidity_half * phase)
            .clamp(bounds.humidity_min, bounds.humidity_max),
        wind_speed_kmh: 5.0,
        precipitation_mm: bounds.precipitation_mm,
        visibility_km: 10.0,
        pressure_hpa: 1013.25,
        condition: bounds.condition,
        provenance: WeatherProvenance::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hour_bucket_boundaries() {
        let a = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 7, 1, 10, 59, 59).unwrap();
        let c = Utc.with_ymd_and_hms(2024, 7, 1, 11, 0, 0).unwrap();
        assert_eq!(hour_bucket(a), hour_bucket(b));
        assert_ne!(hour_bucket(b), hour_bucket(c));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let catalog = Catalog::default();
        let park = catalog.park(&ParkId::from("gombe")).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap();
        assert_eq!(fallback_observation(park, now), fallback_observation(park, now));
    }

    #[test]
    fn test_wet_season_fallback_is_rainy() {
        let catalog = Catalog::default();
        let park = catalog.park(&ParkId::from("serengeti")).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap();
        let observation = fallback_observation(park, now);
        assert_eq!(observation.condition, WeatherCondition::Rainy);
        assert_eq!(observation.provenance, WeatherProvenance::Fallback);
        assert!(fallback_bounds(&park.climate, 4).contains(&observation));
    }
}
