//! Engine error types
//!
//! [`CostingError`] is the service-level error surfaced to callers;
//! storage-layer failures arrive wrapped as [`CostingError::Persistence`].

use crate::db::store::StoreError;
use thiserror::Error;

/// Service-level error taxonomy
#[derive(Debug, Error)]
pub enum CostingError {
    /// Input failed validation (quantity ≤ 0, serves ≤ 0, out-of-range margin, …)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Referenced recipe/dish/ingredient missing
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Adjustment would drive stock below zero; state left unchanged
    #[error(
        "Insufficient stock for ingredient {ingredient_id}: requested {requested}, available {available}"
    )]
    NegativeStock {
        ingredient_id: i64,
        requested: f64,
        available: f64,
    },

    /// Storage call failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

/// Result type for engine operations
pub type CostingResult<T> = Result<T, CostingError>;

impl CostingError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(format!("{} not found", resource.into()))
    }

    /// Whether retrying the same call may succeed (storage deadline misses)
    pub fn is_retryable(&self) -> bool {
        matches!(self, CostingError::Persistence(e) if e.is_retryable())
    }
}
