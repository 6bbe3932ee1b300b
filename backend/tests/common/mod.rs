//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use shared::{Location, WeatherCondition, WeatherObservation, WeatherProvenance};

use wps_server::catalog::Catalog;
use wps_server::external::{BoxFuture, WeatherProvider};
use wps_server::services::scheduler::SchedulerSettings;
use wps_server::services::weather_cache::WeatherCacheSettings;
use wps_server::services::{InMemoryPredictionStore, PredictionStore, TrainingSource};
use wps_server::{AppError, AppResult, Engine, EngineSettings};

// ============================================================================
// Fake weather provider
// ============================================================================

/// Provider returning fixed conditions, with optional latency or failure
pub struct FakeProvider {
    calls: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
    panics: usize,
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
    pub condition: WeatherCondition,
}

impl FakeProvider {
    /// Clear morning: 28°C, 55% humidity, light wind, no rain
    pub fn clear() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
            fail: false,
            panics: 0,
            temperature_celsius: 28.0,
            humidity_percent: 55.0,
            condition: WeatherCondition::Sunny,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::clear()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::clear()
        }
    }

    /// Panics on the first `count` calls, then behaves like `clear`
    pub fn panicking(count: usize) -> Self {
        Self {
            panics: count,
            ..Self::clear()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WeatherProvider for FakeProvider {
    fn current<'a>(
        &'a self,
        location: &'a Location,
        at: DateTime<Utc>,
    ) -> BoxFuture<'a, AppResult<WeatherObservation>> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.panics {
                panic!("provider crashed on call {}", call);
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(AppError::UpstreamUnavailable("provider returned 503".to_string()));
            }
            Ok(WeatherObservation {
                location_id: location.id.clone(),
                timestamp: at,
                temperature_celsius: self.temperature_celsius,
                humidity_percent: self.humidity_percent,
                wind_speed_kmh: 10.0,
                precipitation_mm: 0.0,
                visibility_km: 10.0,
                pressure_hpa: 1013.0,
                condition: self.condition,
                provenance: WeatherProvenance::Live,
            })
        })
    }
}

// ============================================================================
// Engine fixtures
// ============================================================================

pub fn weather_settings() -> WeatherCacheSettings {
    WeatherCacheSettings {
        ttl: Duration::from_secs(1800),
        fallback_ttl: Duration::from_secs(300),
        timeout: Duration::from_secs(5),
    }
}

pub fn engine_settings() -> EngineSettings {
    EngineSettings {
        weather: weather_settings(),
        prediction_ttl: Duration::from_secs(3600),
        scheduler: SchedulerSettings {
            job_timeout: Duration::from_secs(30),
            ..SchedulerSettings::default()
        },
        run_loops: false,
    }
}

/// Engine over the built-in catalog and an in-memory store, not yet started
pub fn engine_with(provider: Arc<dyn WeatherProvider>, settings: EngineSettings) -> Engine {
    let store: Arc<dyn PredictionStore> = Arc::new(InMemoryPredictionStore::new());
    Engine::new(
        Catalog::default(),
        provider,
        store,
        TrainingSource::synthetic(),
        settings,
    )
}

/// Started engine with trained models
pub async fn started_engine(provider: Arc<dyn WeatherProvider>, settings: EngineSettings) -> Engine {
    let engine = engine_with(provider, settings);
    engine.start().await.unwrap();
    engine
}

/// 07:00 in East Africa (UTC+3) during the dry season
pub fn serengeti_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 15, 4, 0, 0).unwrap()
}
