//! Recent prediction history per park
//!
//! Every prediction that lands in the store is appended here. Bounded per
//! park; the oldest entries fall off first.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use shared::{ParkId, Prediction};

pub const HISTORY_PER_PARK: usize = 2000;
pub const MAX_HISTORY_HOURS: i64 = 168;

pub struct PredictionHistory {
    by_park: DashMap<ParkId, VecDeque<Prediction>>,
    capacity: usize,
}

impl Default for PredictionHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_PER_PARK)
    }
}

impl PredictionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_park: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, prediction: Prediction) {
        let mut entries = self.by_park.entry(prediction.park_id.clone()).or_default();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(prediction);
    }

    /// Predictions generated in the last `hours`, newest first
    pub fn since(&self, park_id: &ParkId, hours: i64, now: DateTime<Utc>) -> Vec<Prediction> {
        let cutoff = now - Duration::hours(hours.clamp(1, MAX_HISTORY_HOURS));
        let mut found: Vec<Prediction> = self
            .by_park
            .get(park_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|p| p.generated_at >= cutoff && p.generated_at <= now)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by(|a, b| {
            b.generated_at
                .cmp(&a.generated_at)
                .then_with(|| a.species_id.cmp(&b.species_id))
        });
        found
    }

    pub fn len(&self, park_id: &ParkId) -> usize {
        self.by_park.get(park_id).map(|entries| entries.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PredictionProvenance, SpeciesId, TimeOfDay};

    fn prediction(species: &str, generated_at: DateTime<Utc>) -> Prediction {
        Prediction {
            park_id: ParkId::from("serengeti"),
            species_id: SpeciesId::from(species),
            probability: 0.6,
            confidence: 0.8,
            best_time: TimeOfDay::EarlyMorning,
            best_location: "Seronera Valley".to_string(),
            advisory: String::new(),
            generated_at,
            model_version: 1,
            provenance: PredictionProvenance::Live,
        }
    }

    #[test]
    fn test_window_and_order() {
        let history = PredictionHistory::default();
        let now = Utc::now();
        history.record(prediction("lions", now - Duration::hours(30)));
        history.record(prediction("lions", now - Duration::hours(2)));
        history.record(prediction("zebras", now - Duration::minutes(10)));

        let recent = history.since(&ParkId::from("serengeti"), 24, now);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].species_id, SpeciesId::from("zebras"));
        assert!(history.since(&ParkId::from("gombe"), 24, now).is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let history = PredictionHistory::with_capacity(3);
        let now = Utc::now();
        for minutes in [40, 30, 20, 10] {
            history.record(prediction("lions", now - Duration::minutes(minutes)));
        }
        let park = ParkId::from("serengeti");
        assert_eq!(history.len(&park), 3);
        let kept = history.since(&park, 1, now);
        assert_eq!(kept.last().map(|p| p.generated_at), Some(now - Duration::minutes(30)));
    }
}
