//! Input validation helpers
//!
//! Centralized text length constants and validation functions.
//! Limits are chosen based on:
//! - Reasonable UX limits for names, notes, units
//! - SQLite TEXT has no built-in length enforcement

use crate::utils::CostingError;

// ── Text length limits ──────────────────────────────────────────────

/// Entity names: ingredient, recipe, dish, etc.
pub const MAX_NAME_LEN: usize = 200;

/// Notes and reasons (waste reason, stock-take note, etc.)
pub const MAX_NOTE_LEN: usize = 500;

/// Units of measure ("kg", "piece", …)
pub const MAX_UNIT_LEN: usize = 32;

// ── Numeric limits ──────────────────────────────────────────────────

/// Maximum allowed quantity per movement or recipe line
pub const MAX_QUANTITY: f64 = 1_000_000.0;

/// Maximum allowed unit cost
pub const MAX_UNIT_COST: f64 = 1_000_000.0;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
pub fn require_finite(value: f64, field: &str) -> Result<(), CostingError> {
    if !value.is_finite() {
        return Err(CostingError::validation(format!(
            "{field} must be a finite number, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), CostingError> {
    if value.trim().is_empty() {
        return Err(CostingError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(CostingError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), CostingError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(CostingError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Validate a strictly positive quantity (finite, > 0, bounded).
pub fn validate_quantity(value: f64, field: &str) -> Result<(), CostingError> {
    require_finite(value, field)?;
    if value <= 0.0 {
        return Err(CostingError::validation(format!(
            "{field} must be positive, got {value}"
        )));
    }
    if value > MAX_QUANTITY {
        return Err(CostingError::validation(format!(
            "{field} exceeds maximum allowed ({MAX_QUANTITY}), got {value}"
        )));
    }
    Ok(())
}

/// Validate a non-negative amount (finite, ≥ 0, bounded).
pub fn validate_non_negative(value: f64, field: &str, max: f64) -> Result<(), CostingError> {
    require_finite(value, field)?;
    if value < 0.0 {
        return Err(CostingError::validation(format!(
            "{field} must be non-negative, got {value}"
        )));
    }
    if value > max {
        return Err(CostingError::validation(format!(
            "{field} exceeds maximum allowed ({max}), got {value}"
        )));
    }
    Ok(())
}
