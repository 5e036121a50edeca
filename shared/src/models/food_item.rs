//! Food Item Model

use serde::{Deserialize, Serialize};

/// Sellable catalog entry for a dish
///
/// `cost` mirrors the dish cost's total cost and `price` its effective
/// price; both are pushed by the propagator whenever the recipe or pricing
/// changes. The rest of the catalog entry lives with the surrounding
/// application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct FoodItem {
    pub id: i64,
    pub name: String,
    pub cost: f64,
    pub price: f64,
    pub is_active: bool,
}
