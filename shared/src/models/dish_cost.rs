//! Dish Cost Model

use serde::{Deserialize, Serialize};

/// Derived cost/pricing record for a dish — 1:1 with a food item
///
/// Invariants maintained by the propagator:
/// - `total_cost` is always recomputed from its two cost components
/// - `suggested_price` is always recomputed from `total_cost` and margin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct DishCost {
    pub id: i64,
    pub food_item_id: i64,
    pub total_ingredient_cost: f64,
    pub total_overhead_cost: f64,
    /// `total_ingredient_cost + total_overhead_cost`
    pub total_cost: f64,
    /// Target margin in percent, valid range [0, 100)
    pub profit_margin: f64,
    /// `total_cost / (1 - margin/100)` when `total_cost > 0`, else 0
    pub suggested_price: f64,
    pub use_manual_price: bool,
    pub manual_price: Option<f64>,
    pub updated_at: i64,
}

/// Default margin applied when a dish cost is first created
pub const DEFAULT_PROFIT_MARGIN: f64 = 70.0;

impl DishCost {
    /// The price actually pushed to the food item: the manually pinned value
    /// when `use_manual_price` is set and present, otherwise the suggested
    /// price.
    pub fn effective_price(&self) -> f64 {
        match self.manual_price {
            Some(manual) if self.use_manual_price => manual,
            _ => self.suggested_price,
        }
    }
}

/// Denormalized ingredient snapshot under a dish cost
///
/// A reporting mirror of the recipe lines, replaced wholesale whenever the
/// recipe changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct DishIngredient {
    pub id: i64,
    pub dish_cost_id: i64,
    pub ingredient_id: i64,
    /// Ingredient name at snapshot time
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub total_cost: f64,
}
