//! Prediction engine services

pub mod history;
pub mod model;
pub mod prediction;
pub mod prediction_cache;
pub mod prediction_store;
pub mod scheduler;
pub mod sightings;
pub mod store_writer;
pub mod training;
pub mod weather_cache;

pub use history::PredictionHistory;
pub use model::PredictionModel;
pub use prediction::PredictionService;
pub use prediction_cache::PredictionCache;
pub use prediction_store::{InMemoryPredictionStore, PgPredictionStore, PredictionStore, UpsertOutcome};
pub use scheduler::{JobClass, ReconciliationScheduler, TrainingSource};
pub use sightings::{ActivityLevel, SightingLog};
pub use store_writer::{CommitSender, PendingWrites, StoreWriter};
pub use weather_cache::WeatherCache;
