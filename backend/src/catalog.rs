//! Park and species catalog
//!
//! Static configuration data: park locations, per-species base probabilities,
//! viewing advice, behavioural factors and the seasonal climate profiles used
//! when live weather is unavailable. The built-in catalog covers the four
//! Tanzanian parks; a JSON file with the same shape can replace it.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    FeatureVector, GpsCoordinates, Location, ParkId, Season, SpeciesId, TimeOfDay,
    WeatherCondition,
};

use crate::error::{AppError, AppResult};

/// Static priors never claim certainty
pub const PRIOR_CEILING: f64 = 0.95;

/// Catalog of parks and species
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub parks: Vec<ParkProfile>,
    pub species: Vec<SpeciesProfile>,
}

/// A park with its resident species
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkProfile {
    pub id: ParkId,
    pub name: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
    pub climate: ClimateProfile,
    pub species: BTreeMap<SpeciesId, ParkSpecies>,
}

fn default_utc_offset() -> i32 {
    3
}

/// Per-park attributes of a species
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkSpecies {
    /// Base sighting probability in this park (0-1)
    pub base_probability: f64,
    pub best_location: String,
}

/// Typical conditions for a park, used to synthesize fallback weather
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateProfile {
    pub base_temperature_celsius: f64,
    pub base_humidity_percent: f64,
    /// Half-width of the monthly temperature range
    pub temperature_spread: f64,
    /// Half-width of the monthly humidity range
    pub humidity_spread: f64,
    pub typical_condition: WeatherCondition,
}

/// Species-wide viewing advice and behavioural factors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesProfile {
    pub id: SpeciesId,
    pub optimal_time: TimeOfDay,
    pub tips: String,
    /// Confidence reported with a static prior
    pub prior_confidence: f64,
    pub season_factors: SeasonFactors,
    pub time_factors: TimeFactors,
    pub weather_factors: ConditionFactors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonFactors {
    pub wet: f64,
    pub dry: f64,
    pub transition: f64,
}

impl SeasonFactors {
    pub fn get(&self, season: Season) -> f64 {
        match season {
            Season::Wet => self.wet,
            Season::Dry => self.dry,
            Season::Transition => self.transition,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeFactors {
    pub early_morning: f64,
    pub morning: f64,
    pub afternoon: f64,
    pub late_afternoon: f64,
    pub evening: f64,
    pub night: f64,
}

impl TimeFactors {
    pub fn get(&self, time_of_day: TimeOfDay) -> f64 {
        match time_of_day {
            TimeOfDay::EarlyMorning => self.early_morning,
            TimeOfDay::Morning => self.morning,
            TimeOfDay::Afternoon => self.afternoon,
            TimeOfDay::LateAfternoon => self.late_afternoon,
            TimeOfDay::Evening => self.evening,
            TimeOfDay::Night => self.night,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionFactors {
    pub sunny: f64,
    pub partly_cloudy: f64,
    pub cloudy: f64,
    pub overcast: f64,
    pub rainy: f64,
}

impl ConditionFactors {
    pub fn get(&self, condition: WeatherCondition) -> f64 {
        match condition {
            WeatherCondition::Sunny => self.sunny,
            WeatherCondition::PartlyCloudy => self.partly_cloudy,
            WeatherCondition::Cloudy => self.cloudy,
            WeatherCondition::Overcast => self.overcast,
            WeatherCondition::Rainy => self.rainy,
        }
    }
}

/// Everything needed to answer for one (park, species) pair
#[derive(Debug, Clone, Copy)]
pub struct SpeciesEntry<'a> {
    pub park: &'a ParkProfile,
    pub in_park: &'a ParkSpecies,
    pub profile: &'a SpeciesProfile,
}

impl SpeciesEntry<'_> {
    /// Static prior for a viewing window: base probability scaled by the
    /// time-of-day factor, capped below certainty.
    pub fn static_prior(&self, time_of_day: TimeOfDay) -> f64 {
        (self.in_park.base_probability * self.profile.time_factors.get(time_of_day))
            .clamp(0.0, PRIOR_CEILING)
    }

    /// Expected sighting rate under the given conditions. Used to label
    /// synthetic training data.
    pub fn expected_rate(&self, features: &FeatureVector) -> f64 {
        let rate = self.in_park.base_probability
            * weather_impact(self.profile, features)
            * self.profile.season_factors.get(features.season)
            * self.profile.time_factors.get(features.time_of_day);
        rate.clamp(0.0, 1.0)
    }
}

/// Weather impact on sighting likelihood: condition factor with penalties
/// for heat, cold and heavy rain.
pub fn weather_impact(profile: &SpeciesProfile, features: &FeatureVector) -> f64 {
    let condition = profile.weather_factors.get(features.condition);
    let temperature = if features.temperature_celsius > 35.0 {
        0.8
    } else if features.temperature_celsius < 15.0 {
        0.9
    } else {
        1.0
    };
    let rain = if features.precipitation_mm > 10.0 { 0.7 } else { 1.0 };
    condition * temperature * rain
}

impl ParkProfile {
    pub fn location(&self) -> Location {
        Location {
            id: self.id.clone(),
            name: self.name.clone(),
            coordinates: GpsCoordinates::new(self.latitude, self.longitude),
            utc_offset_hours: self.utc_offset_hours,
        }
    }
}

impl Catalog {
    /// Load a catalog from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        let catalog: Catalog = serde_json::from_str(&raw)
            .map_err(|e| AppError::Configuration(format!("invalid catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check that every park species has a profile and every value is a
    /// probability
    pub fn validate(&self) -> AppResult<()> {
        for park in &self.parks {
            for (species_id, entry) in &park.species {
                if self.species_profile(species_id).is_none() {
                    return Err(AppError::Configuration(format!(
                        "park {} lists species {} without a profile",
                        park.id, species_id
                    )));
                }
                if shared::validate_unit_interval(entry.base_probability).is_err() {
                    return Err(AppError::Configuration(format!(
                        "base probability for {}/{} must be within [0, 1]",
                        park.id, species_id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn park(&self, park_id: &ParkId) -> Option<&ParkProfile> {
        self.parks.iter().find(|p| &p.id == park_id)
    }

    pub fn park_or_err(&self, park_id: &ParkId) -> AppResult<&ParkProfile> {
        self.park(park_id)
            .ok_or_else(|| AppError::UnknownPark(park_id.to_string()))
    }

    pub fn species_profile(&self, species_id: &SpeciesId) -> Option<&SpeciesProfile> {
        self.species.iter().find(|s| &s.id == species_id)
    }

    pub fn entry(&self, park_id: &ParkId, species_id: &SpeciesId) -> Option<SpeciesEntry<'_>> {
        let park = self.park(park_id)?;
        let in_park = park.species.get(species_id)?;
        let profile = self.species_profile(species_id)?;
        Some(SpeciesEntry {
            park,
            in_park,
            profile,
        })
    }

    pub fn park_ids(&self) -> impl Iterator<Item = &ParkId> {
        self.parks.iter().map(|p| &p.id)
    }

    /// Every (park, species) pair in the catalog
    pub fn pairs(&self) -> Vec<(ParkId, SpeciesId)> {
        self.parks
            .iter()
            .flat_map(|park| {
                park.species
                    .keys()
                    .map(move |species| (park.id.clone(), species.clone()))
            })
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let parks = vec![
            park(
                "serengeti",
                "Serengeti National Park",
                "-2.3333",
                "34.8333",
                climate(25.0, 65.0, WeatherCondition::Sunny),
                &[
                    ("lions", 0.8, "Central Serengeti Plains"),
                    ("elephants", 0.7, "Seronera River Valley"),
                    ("cheetahs", 0.6, "Eastern Plains"),
                    ("wildebeest", 0.9, "Migration routes (seasonal)"),
                    ("zebras", 0.8, "Central Plains"),
                    ("giraffes", 0.7, "Acacia woodlands"),
                    ("buffalos", 0.6, "General park area"),
                    ("leopards", 0.5, "Seronera River Valley"),
                    ("hyenas", 0.7, "General park area"),
                    ("antelopes", 0.8, "General park area"),
                ],
            ),
            park(
                "manyara",
                "Lake Manyara National Park",
                "-3.5000",
                "35.8333",
                climate(28.0, 70.0, WeatherCondition::PartlyCloudy),
                &[
                    ("lions", 0.6, "Lake Manyara shores"),
                    ("elephants", 0.8, "Lake Manyara shores"),
                    ("cheetahs", 0.4, "General park area"),
                    ("wildebeest", 0.5, "General park area"),
                    ("zebras", 0.6, "General park area"),
                    ("giraffes", 0.5, "General park area"),
                    ("buffalos", 0.7, "Forest areas"),
                    ("leopards", 0.3, "General park area"),
                    ("hyenas", 0.5, "General park area"),
                    ("antelopes", 0.6, "General park area"),
                ],
            ),
            park(
                "mikumi",
                "Mikumi National Park",
                "-7.1167",
                "37.0833",
                climate(30.0, 60.0, WeatherCondition::Sunny),
                &[
                    ("lions", 0.7, "Mkata Plains"),
                    ("elephants", 0.8, "Mkata Plains"),
                    ("cheetahs", 0.5, "General park area"),
                    ("wildebeest", 0.7, "Mkata Plains"),
                    ("zebras", 0.7, "Mkata Plains"),
                    ("giraffes", 0.6, "General park area"),
                    ("buffalos", 0.8, "Mkata Plains"),
                    ("leopards", 0.4, "General park area"),
                    ("hyenas", 0.6, "General park area"),
                    ("antelopes", 0.7, "General park area"),
                ],
            ),
            park(
                "gombe",
                "Gombe Stream National Park",
                "-4.6667",
                "29.6333",
                climate(26.0, 80.0, WeatherCondition::Cloudy),
                &[
                    ("lions", 0.3, "General park area"),
                    ("elephants", 0.4, "General park area"),
                    ("cheetahs", 0.2, "General park area"),
                    ("wildebeest", 0.3, "General park area"),
                    ("zebras", 0.3, "General park area"),
                    ("giraffes", 0.2, "General park area"),
                    ("buffalos", 0.4, "Forest edges"),
                    ("leopards", 0.2, "Forest understory"),
                    ("hyenas", 0.3, "General park area"),
                    ("antelopes", 0.4, "Forest understory"),
                ],
            ),
        ];

        let species = vec![
            species(
                "lions",
                TimeOfDay::EarlyMorning,
                "Look for them in the early morning or late afternoon near water sources",
                [0.9, 1.1, 1.0],
                [1.3, 1.0, 0.7, 0.8, 1.2, 1.1],
                [1.2, 1.0, 1.0, 0.9, 0.7],
            ),
            species(
                "elephants",
                TimeOfDay::LateAfternoon,
                "Best viewed near water sources during hot afternoons",
                [1.2, 1.0, 1.1],
                [1.1, 1.0, 0.9, 1.1, 1.1, 0.8],
                [1.0, 1.0, 1.1, 1.0, 0.8],
            ),
            species(
                "cheetahs",
                TimeOfDay::EarlyMorning,
                "Active during cooler morning hours, often on elevated positions",
                [0.8, 1.2, 1.0],
                [1.4, 1.2, 0.6, 0.8, 1.3, 0.9],
                [1.3, 1.0, 1.0, 0.9, 0.6],
            ),
            species(
                "wildebeest",
                TimeOfDay::Morning,
                "Follow migration patterns, best during dry season",
                [1.3, 0.8, 1.1],
                [1.2, 1.1, 0.8, 0.9, 1.0, 0.7],
                [1.0, 1.0, 1.0, 1.0, 0.9],
            ),
            species(
                "zebras",
                TimeOfDay::Morning,
                "Often seen grazing with wildebeest, active throughout the day",
                [1.1, 0.9, 1.0],
                [1.1, 1.0, 0.9, 1.0, 1.0, 0.8],
                [1.0, 1.0, 1.0, 1.0, 0.8],
            ),
            species(
                "giraffes",
                TimeOfDay::Morning,
                "Look in acacia woodlands, they're active during daylight hours",
                [0.9, 1.0, 1.0],
                [1.0, 1.0, 0.8, 0.9, 0.9, 0.7],
                [1.0, 1.0, 1.0, 1.0, 0.8],
            ),
            species(
                "buffalos",
                TimeOfDay::Morning,
                "Often found in herds, look near water sources",
                [1.1, 1.0, 1.0],
                [1.1, 1.0, 0.9, 1.0, 1.0, 0.8],
                [1.0, 1.0, 1.0, 1.0, 0.8],
            ),
            species(
                "leopards",
                TimeOfDay::Evening,
                "Scan large trees along rivers, most active at dusk",
                [0.9, 1.1, 1.0],
                [1.2, 1.0, 0.8, 0.9, 1.1, 1.2],
                [1.0, 1.0, 1.0, 1.0, 0.8],
            ),
            species(
                "hyenas",
                TimeOfDay::Night,
                "Most active after dark, often near recent kills",
                [1.0, 1.0, 1.0],
                [1.0, 0.9, 0.8, 0.9, 1.1, 1.3],
                [1.0, 1.0, 1.0, 1.0, 0.8],
            ),
            species(
                "antelopes",
                TimeOfDay::Morning,
                "Shy animals, best viewed during quiet morning drives",
                [1.1, 0.9, 1.0],
                [1.1, 1.0, 0.9, 1.0, 1.0, 0.8],
                [1.0, 1.0, 1.0, 1.0, 0.8],
            ),
        ];

        Catalog { parks, species }
    }
}

fn climate(temperature: f64, humidity: f64, condition: WeatherCondition) -> ClimateProfile {
    ClimateProfile {
        base_temperature_celsius: temperature,
        base_humidity_percent: humidity,
        temperature_spread: 4.0,
        humidity_spread: 10.0,
        typical_condition: condition,
    }
}

fn park(
    id: &str,
    name: &str,
    latitude: &str,
    longitude: &str,
    climate: ClimateProfile,
    species: &[(&str, f64, &str)],
) -> ParkProfile {
    ParkProfile {
        id: ParkId::from(id),
        name: name.to_string(),
        latitude: latitude.parse().unwrap_or_default(),
        longitude: longitude.parse().unwrap_or_default(),
        utc_offset_hours: default_utc_offset(),
        climate,
        species: species
            .iter()
            .map(|(species_id, base_probability, best_location)| {
                (
                    SpeciesId::from(*species_id),
                    ParkSpecies {
                        base_probability: *base_probability,
                        best_location: best_location.to_string(),
                    },
                )
            })
            .collect(),
    }
}

fn species(
    id: &str,
    optimal_time: TimeOfDay,
    tips: &str,
    seasons: [f64; 3],
    times: [f64; 6],
    conditions: [f64; 5],
) -> SpeciesProfile {
    SpeciesProfile {
        id: SpeciesId::from(id),
        optimal_time,
        tips: tips.to_string(),
        prior_confidence: 0.4,
        season_factors: SeasonFactors {
            wet: seasons[0],
            dry: seasons[1],
            transition: seasons[2],
        },
        time_factors: TimeFactors {
            early_morning: times[0],
            morning: times[1],
            afternoon: times[2],
            late_afternoon: times[3],
            evening: times[4],
            night: times[5],
        },
        weather_factors: ConditionFactors {
            sunny: conditions[0],
            partly_cloudy: conditions[1],
            cloudy: conditions[2],
            overcast: conditions[3],
            rainy: conditions[4],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::WeatherProvenance;

    fn features(condition: WeatherCondition, temperature: f64, precipitation: f64) -> FeatureVector {
        FeatureVector {
            temperature_celsius: temperature,
            humidity_percent: 55.0,
            wind_speed_kmh: 10.0,
            precipitation_mm: precipitation,
            visibility_km: 10.0,
            pressure_hpa: 1013.0,
            condition,
            time_of_day: TimeOfDay::EarlyMorning,
            season: Season::Dry,
            weather_provenance: WeatherProvenance::Live,
        }
    }

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = Catalog::default();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.parks.len(), 4);
        assert_eq!(catalog.pairs().len(), 40);
    }

    #[test]
    fn test_static_prior_is_capped() {
        let catalog = Catalog::default();
        let lions = catalog
            .entry(&ParkId::from("serengeti"), &SpeciesId::from("lions"))
            .unwrap();
        assert_eq!(lions.static_prior(TimeOfDay::EarlyMorning), PRIOR_CEILING);
        assert!((lions.static_prior(TimeOfDay::Afternoon) - 0.56).abs() < 1e-9);
    }

    #[test]
    fn test_weather_impact_penalties() {
        let catalog = Catalog::default();
        let lions = catalog.species_profile(&SpeciesId::from("lions")).unwrap();
        let clear = weather_impact(lions, &features(WeatherCondition::Sunny, 28.0, 0.0));
        let hot = weather_impact(lions, &features(WeatherCondition::Sunny, 38.0, 0.0));
        let storm = weather_impact(lions, &features(WeatherCondition::Rainy, 28.0, 20.0));
        assert!((clear - 1.2).abs() < 1e-9);
        assert!((hot - 0.96).abs() < 1e-9);
        assert!((storm - 0.49).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_entries() {
        let catalog = Catalog::default();
        assert!(catalog.park(&ParkId::from("kruger")).is_none());
        assert!(catalog
            .entry(&ParkId::from("gombe"), &SpeciesId::from("chimpanzees"))
            .is_none());
    }

    #[test]
    fn test_validate_rejects_missing_profile() {
        let mut catalog = Catalog::default();
        catalog.species.retain(|s| s.id.as_str() != "hyenas");
        assert!(catalog.validate().is_err());
    }
}
