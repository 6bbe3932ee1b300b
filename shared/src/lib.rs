//! Shared types and models for the wildlife prediction service
//!
//! This crate contains the domain types exchanged between the prediction
//! backend and any client that consumes its predictions.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
