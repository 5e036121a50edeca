//! Data models
//!
//! Shared between the costing engine and the back-office application.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY, snowflake-generated).

pub mod dish_cost;
pub mod food_item;
pub mod ingredient;
pub mod inventory_transaction;
pub mod recipe;

// Re-exports
pub use dish_cost::*;
pub use food_item::*;
pub use ingredient::*;
pub use inventory_transaction::*;
pub use recipe::*;
