//! Sighting report log
//!
//! Reports are kept in memory, newest last, bounded per park.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use shared::{ParkId, Sighting, SightingReport, SpeciesId};
use validator::Validate;

use crate::catalog::Catalog;
use crate::error::{AppError, AppResult};

pub const SIGHTINGS_PER_PARK: usize = 500;
const RECENT_WINDOW_HOURS: i64 = 24;
/// Window the park activity level is judged over
pub const ACTIVITY_WINDOW_HOURS: i64 = 6;

/// How busy a park is, from its recent sightings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ActivityLevel {
    pub fn from_count(count: usize) -> Self {
        match count {
            10.. => ActivityLevel::VeryHigh,
            6..=9 => ActivityLevel::High,
            3..=5 => ActivityLevel::Medium,
            _ => ActivityLevel::Low,
        }
    }
}

pub struct SightingLog {
    catalog: Arc<Catalog>,
    by_park: DashMap<ParkId, VecDeque<Sighting>>,
    capacity: usize,
}

impl SightingLog {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_capacity(catalog, SIGHTINGS_PER_PARK)
    }

    pub fn with_capacity(catalog: Arc<Catalog>, capacity: usize) -> Self {
        Self {
            catalog,
            by_park: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Validate and record a report
    pub fn record(&self, report: SightingReport, now: DateTime<Utc>) -> AppResult<Sighting> {
        report.validate()?;

        if report.sighting_time > now + Duration::minutes(5) {
            return Err(AppError::Validation {
                field: "sighting_time".to_string(),
                message: "Sighting time cannot be in the future".to_string(),
            });
        }

        let park_id = ParkId::new(&report.park_id);
        let species_id = SpeciesId::new(&report.species_id);
        self.catalog.park_or_err(&park_id)?;
        if self.catalog.entry(&park_id, &species_id).is_none() {
            return Err(AppError::Validation {
                field: "species_id".to_string(),
                message: format!("{} is not tracked in {}", species_id, park_id),
            });
        }

        let sighting = Sighting::from_report(report, now);
        {
            let mut reports = self.by_park.entry(park_id.clone()).or_default();
            if reports.len() == self.capacity {
                reports.pop_front();
            }
            reports.push_back(sighting.clone());
        }

        tracing::info!(
            park = %park_id,
            species = %species_id,
            sighting = %sighting.id,
            "Sighting recorded"
        );
        Ok(sighting)
    }

    /// Reports for a park, newest first
    pub fn list(&self, park_id: &ParkId) -> AppResult<Vec<Sighting>> {
        self.catalog.park_or_err(park_id)?;
        Ok(self
            .by_park
            .get(park_id)
            .map(|reports| reports.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    /// Sightings of any species in the park over the last `hours`
    pub fn park_count(&self, park_id: &ParkId, hours: i64, now: DateTime<Utc>) -> usize {
        let since = now - Duration::hours(hours);
        self.by_park
            .get(park_id)
            .map(|reports| {
                reports
                    .iter()
                    .filter(|s| s.sighting_time > since && s.sighting_time <= now)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Activity level over the last few hours
    pub fn activity(&self, park_id: &ParkId, now: DateTime<Utc>) -> (ActivityLevel, usize) {
        let count = self.park_count(park_id, ACTIVITY_WINDOW_HOURS, now);
        (ActivityLevel::from_count(count), count)
    }

    /// Sightings of a species in the last 24 hours
    pub fn recent_count(&self, park_id: &ParkId, species_id: &SpeciesId, now: DateTime<Utc>) -> usize {
        let since = now - Duration::hours(RECENT_WINDOW_HOURS);
        self.by_park
            .get(park_id)
            .map(|reports| {
                reports
                    .iter()
                    .filter(|s| s.species_id == species_id.as_str())
                    .filter(|s| s.sighting_time > since && s.sighting_time <= now)
                    .count()
            })
            .unwrap_or(0)
    }
}
