//! Error handling for the Wildlife Prediction Service
//!
//! Provides consistent JSON error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown park: {0}")]
    UnknownPark(String),

    // Prediction errors
    #[error("No trained model for {park}/{species}")]
    ModelNotReady { park: String, species: String },

    #[error("No prediction available for {park}/{species}")]
    PredictionUnavailable { park: String, species: String },

    #[error("Job {job} for {key} exceeded its {budget_secs}s budget")]
    JobTimeout {
        job: String,
        key: String,
        budget_secs: u64,
    },

    // External service errors
    #[error("Weather provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Engine is shutting down")]
    ShuttingDown,

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        let detail = |code: &str, message: String, field: Option<String>| ErrorDetail {
            code: code.to_string(),
            message,
            field,
        };

        match self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                detail("VALIDATION_ERROR", message.clone(), Some(field.clone())),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                detail("VALIDATION_ERROR", msg.clone(), None),
            ),
            AppError::UnknownPark(park) => (
                StatusCode::NOT_FOUND,
                detail(
                    "UNKNOWN_PARK",
                    format!("Park {} is not in the catalog", park),
                    Some("park_id".to_string()),
                ),
            ),
            AppError::ModelNotReady { park, species } => (
                StatusCode::SERVICE_UNAVAILABLE,
                detail(
                    "MODEL_NOT_READY",
                    format!("No trained model for {} in {}", species, park),
                    None,
                ),
            ),
            AppError::PredictionUnavailable { park, species } => (
                StatusCode::NOT_FOUND,
                detail(
                    "PREDICTION_UNAVAILABLE",
                    format!("No prediction is available for {} in {}", species, park),
                    Some("species".to_string()),
                ),
            ),
            AppError::JobTimeout { job, key, budget_secs } => (
                StatusCode::GATEWAY_TIMEOUT,
                detail(
                    "JOB_TIMEOUT",
                    format!("{} for {} exceeded {}s", job, key, budget_secs),
                    None,
                ),
            ),
            AppError::UpstreamUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                detail("UPSTREAM_UNAVAILABLE", format!("Weather provider error: {}", msg), None),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("CONFIGURATION_ERROR", format!("Configuration error: {}", msg), None),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("DATABASE_ERROR", "A database error occurred".to_string(), None),
            ),
            AppError::ShuttingDown => (
                StatusCode::SERVICE_UNAVAILABLE,
                detail("SHUTTING_DOWN", "The engine is shutting down".to_string(), None),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("INTERNAL_ERROR", msg.clone(), None),
            ),
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> String {
        self.status_and_detail().1.code
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        match errors.field_errors().into_iter().next() {
            Some((field, _)) => AppError::Validation {
                field: field.to_string(),
                message: format!("Invalid value for {}", field),
            },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {:?}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_unavailable_maps_to_404() {
        let err = AppError::PredictionUnavailable {
            park: "gombe".to_string(),
            species: "rhinos".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_codes() {
        assert_eq!(AppError::UnknownPark("x".into()).code(), "UNKNOWN_PARK");
        assert_eq!(
            AppError::ModelNotReady {
                park: "mikumi".into(),
                species: "zebras".into()
            }
            .code(),
            "MODEL_NOT_READY"
        );
    }
}
