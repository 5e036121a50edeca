//! Ingredient Model

use serde::{Deserialize, Serialize};

/// Ingredient entity — authoritative unit cost and stock level
///
/// Stock is mutated through stock-ledger operations only; catalog edits
/// cover the descriptive fields and the unit cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    /// Unit of measure, e.g. "kg" / "l" / "piece"
    pub unit: String,
    /// Cost per unit of measure
    pub unit_cost: f64,
    /// Current stock level, never negative
    pub stock_quantity: f64,
    /// Stock level at which the ingredient shows up in the reorder report
    pub reorder_level: f64,
    pub is_active: bool,
}

/// Create ingredient payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientCreate {
    pub name: String,
    pub unit: String,
    pub unit_cost: f64,
    /// Opening stock level (defaults to 0)
    pub stock_quantity: Option<f64>,
    pub reorder_level: Option<f64>,
}

/// Update ingredient payload
///
/// Stock is deliberately absent here — quantity changes go through the
/// stock ledger so every movement is logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientUpdate {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub unit_cost: Option<f64>,
    pub reorder_level: Option<f64>,
    pub is_active: Option<bool>,
}
