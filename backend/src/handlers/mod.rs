//! HTTP handlers for the Wildlife Prediction Service

pub mod health;
pub mod models;
pub mod parks;
pub mod predictions;
pub mod sightings;
pub mod sync;
pub mod weather;

pub use health::health_check;
pub use models::{get_model_summaries, retrain_park_models};
pub use parks::{get_park_status, get_prediction_history};
pub use predictions::{get_park_predictions, get_species_prediction};
pub use sightings::{list_sightings, record_sighting};
pub use sync::{get_sync_status, sync_predictions, sync_store, sync_weather};
pub use weather::get_current_weather;
