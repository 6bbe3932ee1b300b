//! Domain models for the wildlife prediction service

mod park;
mod prediction;
mod sighting;
mod weather;

pub use park::*;
pub use prediction::*;
pub use sighting::*;
pub use weather::*;
