//! Weather data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParkId;
use crate::types::{Season, TimeOfDay};

/// Categorical weather condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Sunny,
    PartlyCloudy,
    Cloudy,
    Overcast,
    Rainy,
}

impl WeatherCondition {
    pub const ALL: [WeatherCondition; 5] = [
        WeatherCondition::Sunny,
        WeatherCondition::PartlyCloudy,
        WeatherCondition::Cloudy,
        WeatherCondition::Overcast,
        WeatherCondition::Rainy,
    ];

    /// Map a provider condition code (OpenWeatherMap `main` group or our own
    /// labels) onto a condition. Unknown codes return `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "clear" | "sunny" => Some(WeatherCondition::Sunny),
            "partly_cloudy" | "partly cloudy" => Some(WeatherCondition::PartlyCloudy),
            "clouds" | "cloudy" => Some(WeatherCondition::Cloudy),
            "mist" | "fog" | "haze" | "smoke" | "dust" | "overcast" => {
                Some(WeatherCondition::Overcast)
            }
            "rain" | "drizzle" | "thunderstorm" | "snow" | "rainy" => Some(WeatherCondition::Rainy),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            WeatherCondition::Sunny => "sunny",
            WeatherCondition::PartlyCloudy => "partly_cloudy",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Overcast => "overcast",
            WeatherCondition::Rainy => "rainy",
        }
    }
}

/// Where a weather observation came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeatherProvenance {
    /// Fetched from the upstream provider
    Live,
    /// Synthesized from the seasonal profile after a provider failure
    Fallback,
}

/// A weather observation for a park at a point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherObservation {
    pub location_id: ParkId,
    pub timestamp: DateTime<Utc>,
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
    pub wind_speed_kmh: f64,
    pub precipitation_mm: f64,
    pub visibility_km: f64,
    pub pressure_hpa: f64,
    pub condition: WeatherCondition,
    pub provenance: WeatherProvenance,
}

impl WeatherObservation {
    pub fn is_live(&self) -> bool {
        self.provenance == WeatherProvenance::Live
    }
}

/// Model input derived from an observation and its temporal context.
/// Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
    pub wind_speed_kmh: f64,
    pub precipitation_mm: f64,
    pub visibility_km: f64,
    pub pressure_hpa: f64,
    pub condition: WeatherCondition,
    pub time_of_day: TimeOfDay,
    pub season: Season,
    pub weather_provenance: WeatherProvenance,
}

impl FeatureVector {
    /// Number of continuous inputs
    pub const NUMERIC_LEN: usize = 6;

    pub fn from_observation(observation: &WeatherObservation, utc_offset_hours: i32) -> Self {
        Self {
            temperature_celsius: observation.temperature_celsius,
            humidity_percent: observation.humidity_percent,
            wind_speed_kmh: observation.wind_speed_kmh,
            precipitation_mm: observation.precipitation_mm,
            visibility_km: observation.visibility_km,
            pressure_hpa: observation.pressure_hpa,
            condition: observation.condition,
            time_of_day: TimeOfDay::at(observation.timestamp, utc_offset_hours),
            season: Season::at(observation.timestamp, utc_offset_hours),
            weather_provenance: observation.provenance,
        }
    }

    pub fn numeric(&self) -> [f64; Self::NUMERIC_LEN] {
        [
            self.temperature_celsius,
            self.humidity_percent,
            self.wind_speed_kmh,
            self.precipitation_mm,
            self.visibility_km,
            self.pressure_hpa,
        ]
    }

    pub fn is_degraded(&self) -> bool {
        self.weather_provenance == WeatherProvenance::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_condition_codes() {
        assert_eq!(WeatherCondition::from_code("Clear"), Some(WeatherCondition::Sunny));
        assert_eq!(WeatherCondition::from_code("clear"), Some(WeatherCondition::Sunny));
        assert_eq!(WeatherCondition::from_code("Clouds"), Some(WeatherCondition::Cloudy));
        assert_eq!(WeatherCondition::from_code("Thunderstorm"), Some(WeatherCondition::Rainy));
        assert_eq!(WeatherCondition::from_code("Haze"), Some(WeatherCondition::Overcast));
        assert_eq!(WeatherCondition::from_code("volcanic"), None);
    }

    #[test]
    fn test_feature_vector_from_observation() {
        let observation = WeatherObservation {
            location_id: ParkId::from("serengeti"),
            timestamp: Utc.with_ymd_and_hms(2024, 4, 10, 4, 30, 0).unwrap(),
            temperature_celsius: 28.0,
            humidity_percent: 55.0,
            wind_speed_kmh: 10.0,
            precipitation_mm: 0.0,
            visibility_km: 10.0,
            pressure_hpa: 1013.0,
            condition: WeatherCondition::Sunny,
            provenance: WeatherProvenance::Fallback,
        };

        let features = FeatureVector::from_observation(&observation, 3);
        assert_eq!(features.time_of_day, TimeOfDay::EarlyMorning);
        assert_eq!(features.season, Season::Wet);
        assert!(features.is_degraded());
        assert_eq!(features.numeric()[5], 1013.0);
    }
}
