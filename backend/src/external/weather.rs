//! Weather API client for fetching current conditions
//!
//! Integrates with the OpenWeatherMap "current weather" endpoint. The provider
//! is unreliable by assumption: callers decide what to do with failures.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use shared::{Location, WeatherCondition, WeatherObservation, WeatherProvenance};

use crate::error::{AppError, AppResult};

/// Boxed future returned by provider calls
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of live weather observations
pub trait WeatherProvider: Send + Sync {
    /// Fetch current conditions for a location, stamped with `at`
    fn current<'a>(
        &'a self,
        location: &'a Location,
        at: DateTime<Utc>,
    ) -> BoxFuture<'a, AppResult<WeatherObservation>>;
}

/// OpenWeatherMap client
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// OpenWeatherMap API response for current weather
#[derive(Debug, Deserialize)]
struct OWMCurrentResponse {
    weather: Vec<OWMWeather>,
    main: OWMMain,
    visibility: f64,
    wind: OWMWind,
    rain: Option<OWMRain>,
}

#[derive(Debug, Deserialize)]
struct OWMWeather {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OWMMain {
    temp: f64,
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OWMWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OWMRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hour: Option<f64>,
}

impl OpenWeatherClient {
    /// Create a client against the configured API endpoint
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Weather client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch current weather conditions by GPS coordinates
    pub async fn get_current_weather(
        &self,
        location: &Location,
        at: DateTime<Utc>,
    ) -> AppResult<WeatherObservation> {
        let url = format!(
            "{}/weather?lat={}&lon={}&appid={}&units=metric",
            self.base_url,
            location.coordinates.latitude,
            location.coordinates.longitude,
            self.api_key
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Weather API request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamUnavailable(format!(
                "Weather API error: {} - {}",
                status, body
            )));
        }

        let body = response.text().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to read weather response: {}", e))
        })?;

        parse_current_response(&body, location, at)
    }
}

impl WeatherProvider for OpenWeatherClient {
    fn current<'a>(
        &'a self,
        location: &'a Location,
        at: DateTime<Utc>,
    ) -> BoxFuture<'a, AppResult<WeatherObservation>> {
        Box::pin(self.get_current_weather(location, at))
    }
}

/// Parse an OpenWeatherMap current-weather body into an observation.
/// Missing fields and unknown condition groups are rejected.
pub fn parse_current_response(
    body: &str,
    location: &Location,
    at: DateTime<Utc>,
) -> AppResult<WeatherObservation> {
    let data: OWMCurrentResponse = serde_json::from_str(body).map_err(|e| {
        AppError::UpstreamUnavailable(format!("Failed to parse weather response: {}", e))
    })?;

    let group = data
        .weather
        .first()
        .map(|w| w.main.as_str())
        .ok_or_else(|| AppError::UpstreamUnavailable("Weather response has no condition".into()))?;
    let condition = WeatherCondition::from_code(group).ok_or_else(|| {
        AppError::UpstreamUnavailable(format!("Unknown weather condition: {}", group))
    })?;

    let precipitation_mm = data
        .rain
        .as_ref()
        .and_then(|r| r.one_hour.or(r.three_hour))
        .unwrap_or(0.0);

    let observation = WeatherObservation {
        location_id: location.id.clone(),
        timestamp: at,
        temperature_celsius: data.main.temp,
        humidity_percent: data.main.humidity,
        // m/s to km/h
        wind_speed_kmh: data.wind.speed * 3.6,
        precipitation_mm,
        // metres to kilometres
        visibility_km: data.visibility / 1000.0,
        pressure_hpa: data.main.pressure,
        condition,
        provenance: WeatherProvenance::Live,
    };

    let numeric_ok = [
        observation.temperature_celsius,
        observation.humidity_percent,
        observation.wind_speed_kmh,
        observation.precipitation_mm,
        observation.visibility_km,
        observation.pressure_hpa,
    ]
    .iter()
    .all(|v| v.is_finite());
    if !numeric_ok {
        return Err(AppError::UpstreamUnavailable(
            "Weather response contains non-numeric values".into(),
        ));
    }

    Ok(observation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::{GpsCoordinates, ParkId};

    fn serengeti() -> Location {
        Location {
            id: ParkId::from("serengeti"),
            name: "Serengeti National Park".to_string(),
            coordinates: GpsCoordinates::new(Decimal::new(-23333, 4), Decimal::new(348333, 4)),
            utc_offset_hours: 3,
        }
    }

    #[test]
    fn test_parse_full_payload() {
        let body = r#"{
            "weather": [{"main": "Clear", "description": "clear sky", "icon": "01d"}],
            "main": {"temp": 28.0, "feels_like": 29.1, "pressure": 1013, "humidity": 55},
            "visibility": 10000,
            "wind": {"speed": 2.5, "deg": 90},
            "dt": 1720000000
        }"#;

        let observation = parse_current_response(body, &serengeti(), Utc::now()).unwrap();
        assert_eq!(observation.condition, WeatherCondition::Sunny);
        assert_eq!(observation.visibility_km, 10.0);
        assert_eq!(observation.wind_speed_kmh, 9.0);
        assert_eq!(observation.precipitation_mm, 0.0);
        assert!(observation.is_live());
    }

    #[test]
    fn test_parse_rain_volume() {
        let body = r#"{
            "weather": [{"main": "Rain"}],
            "main": {"temp": 22.0, "pressure": 1008, "humidity": 90},
            "visibility": 4000,
            "wind": {"speed": 5.0},
            "rain": {"1h": 12.5}
        }"#;

        let observation = parse_current_response(body, &serengeti(), Utc::now()).unwrap();
        assert_eq!(observation.condition, WeatherCondition::Rainy);
        assert_eq!(observation.precipitation_mm, 12.5);
    }

    #[test]
    fn test_missing_fields_rejected() {
        let body = r#"{
            "weather": [{"main": "Clear"}],
            "main": {"temp": 28.0, "pressure": 1013},
            "visibility": 10000,
            "wind": {"speed": 2.5}
        }"#;

        let err = parse_current_response(body, &serengeti(), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_unknown_condition_rejected() {
        let body = r#"{
            "weather": [{"main": "Ashfall"}],
            "main": {"temp": 28.0, "pressure": 1013, "humidity": 40},
            "visibility": 10000,
            "wind": {"speed": 2.5}
        }"#;

        assert!(parse_current_response(body, &serengeti(), Utc::now()).is_err());
    }
}
