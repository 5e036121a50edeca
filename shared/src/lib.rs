//! Shared types for the back-office costing engine
//!
//! Entity models and small utilities used by the costing engine and the
//! surrounding back-office application. DB row types derive `sqlx::FromRow`
//! behind the optional `db` feature so API-only consumers stay light.

pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
