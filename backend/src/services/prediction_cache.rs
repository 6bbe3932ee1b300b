//! In-process fast cache of the latest predictions
//!
//! Entries expire once their generation timestamp is older than the TTL. The
//! cache never overrides the store: it only accepts newer predictions, and
//! the store writer replaces entries with the stored row when they disagree.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared::{ParkId, Prediction, SpeciesId};

pub struct PredictionCache {
    entries: DashMap<(ParkId, SpeciesId), Prediction>,
    ttl: chrono::Duration,
}

impl PredictionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1)),
        }
    }

    pub fn is_fresh(&self, prediction: &Prediction, now: DateTime<Utc>) -> bool {
        now - prediction.generated_at < self.ttl
    }

    pub fn get(&self, park_id: &ParkId, species_id: &SpeciesId, now: DateTime<Utc>) -> Option<Prediction> {
        self.entries
            .get(&(park_id.clone(), species_id.clone()))
            .filter(|entry| self.is_fresh(entry.value(), now))
            .map(|entry| entry.value().clone())
    }

    /// Fresh entries for a park
    pub fn park(&self, park_id: &ParkId, now: DateTime<Utc>) -> Vec<Prediction> {
        self.entries
            .iter()
            .filter(|entry| &entry.key().0 == park_id && self.is_fresh(entry.value(), now))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Insert unless a newer prediction is already cached. Returns whether
    /// the entry changed.
    pub fn insert_if_newer(&self, prediction: Prediction) -> bool {
        let key = (prediction.park_id.clone(), prediction.species_id.clone());
        match self.entries.entry(key) {
            Entry::Occupied(mut cached) => {
                if prediction.supersedes(cached.get()) {
                    cached.insert(prediction);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(prediction);
                true
            }
        }
    }

    /// Replace an entry with the store's authoritative row
    pub fn put(&self, prediction: Prediction) {
        self.entries.insert(
            (prediction.park_id.clone(), prediction.species_id.clone()),
            prediction,
        );
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, prediction| now - prediction.generated_at < self.ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PredictionProvenance, TimeOfDay};

    fn prediction(generated_at: DateTime<Utc>, probability: f64) -> Prediction {
        Prediction {
            park_id: ParkId::from("manyara"),
            species_id: SpeciesId::from("elephants"),
            probability,
            confidence: 0.8,
            best_time: TimeOfDay::LateAfternoon,
            best_location: "Lake Manyara shores".to_string(),
            advisory: String::new(),
            generated_at,
            model_version: 2,
            provenance: PredictionProvenance::Live,
        }
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = PredictionCache::new(Duration::from_secs(3600));
        let now = Utc::now();
        cache.insert_if_newer(prediction(now, 0.7));

        let park = ParkId::from("manyara");
        let species = SpeciesId::from("elephants");
        assert!(cache.get(&park, &species, now + chrono::Duration::minutes(59)).is_some());
        assert!(cache.get(&park, &species, now + chrono::Duration::minutes(61)).is_none());
        assert_eq!(cache.purge_expired(now + chrono::Duration::hours(2)), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_older_insert_is_ignored() {
        let cache = PredictionCache::new(Duration::from_secs(3600));
        let now = Utc::now();
        assert!(cache.insert_if_newer(prediction(now, 0.7)));
        assert!(!cache.insert_if_newer(prediction(now - chrono::Duration::seconds(5), 0.1)));

        let cached = cache
            .get(&ParkId::from("manyara"), &SpeciesId::from("elephants"), now)
            .unwrap();
        assert_eq!(cached.probability, 0.7);
    }
}
