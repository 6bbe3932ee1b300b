//! Validation utilities for the wildlife prediction service

use validator::ValidationError;

// ============================================================================
// Identifier Validations
// ============================================================================

/// Park and species identifiers: 2-40 lowercase-able ASCII letters, digits or `_`
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.len() < 2 || trimmed.len() > 40 {
        return Err(ValidationError::new("identifier_length"));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ValidationError::new("identifier_charset"));
    }
    Ok(())
}

// ============================================================================
// Numeric Validations
// ============================================================================

/// Validate that a probability-like value lies in [0, 1]
pub fn validate_unit_interval(value: f64) -> Result<(), &'static str> {
    if !value.is_finite() {
        return Err("Value must be a finite number");
    }
    if !(0.0..=1.0).contains(&value) {
        return Err("Value must be between 0 and 1");
    }
    Ok(())
}

/// Clamp a value into [0, 1], mapping non-finite input to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Validate GPS coordinates are on the globe
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), &'static str> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err("Latitude must be between -90 and 90");
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}
