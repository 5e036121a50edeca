//! Recipe Model

use serde::{Deserialize, Serialize};

/// Recipe entity — 1:1 with a food item
///
/// `total_cost` and `cost_per_serving` are derived; they are recomputed and
/// written on every save, never edited directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Recipe {
    pub id: i64,
    pub food_item_id: i64,
    pub name: String,
    /// Number of servings the ingredient quantities yield
    pub serves: i32,
    pub total_cost: f64,
    pub cost_per_serving: f64,
    /// Last save time (UTC millis)
    pub updated_at: i64,
}

/// Recipe ingredient line
///
/// Lines are owned by their recipe and replaced as a whole set on every
/// save, never patched individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct RecipeIngredient {
    pub id: i64,
    pub recipe_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: String,
    /// `ingredient.unit_cost × quantity` at save time
    pub line_cost: f64,
}
