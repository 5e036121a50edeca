//! Recipe Cost Calculator
//!
//! Pure cost computation for a recipe's ingredient lines. No storage, no
//! side effects — callers resolve the catalog (one batched read) and hand
//! it in, so identical inputs always produce identical output.

use crate::utils::money::{round_cost, to_decimal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::Ingredient;
use std::collections::HashMap;

/// One ingredient line of a recipe as supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeLineInput {
    pub ingredient_id: i64,
    pub quantity: f64,
    /// Unit override; defaults to the catalog unit when absent
    pub unit: Option<String>,
}

/// A line priced against the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostedLine {
    pub ingredient_id: i64,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub line_cost: f64,
}

/// Result of costing a recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeCostBreakdown {
    pub total_cost: f64,
    pub cost_per_serving: f64,
    pub lines: Vec<CostedLine>,
    /// Ids of lines whose ingredient was not in the catalog. Such lines
    /// contribute zero cost and are dropped from `lines` — a tolerance for
    /// stale references, kept visible so callers can surface it.
    pub missing_ingredients: Vec<i64>,
}

/// Price a recipe's lines against the given catalog slice.
///
/// `cost_per_serving` falls back to the total when `serves` is not positive;
/// the services reject such recipes at validation, this guard only keeps old
/// rows from dividing by zero.
pub fn compute_recipe_cost(
    lines: &[RecipeLineInput],
    catalog: &HashMap<i64, Ingredient>,
    serves: i32,
) -> RecipeCostBreakdown {
    let mut total = Decimal::ZERO;
    let mut costed = Vec::with_capacity(lines.len());
    let mut missing = Vec::new();

    for line in lines {
        let Some(ingredient) = catalog.get(&line.ingredient_id) else {
            tracing::warn!(
                ingredient_id = line.ingredient_id,
                "recipe line references unknown ingredient, costing it at zero"
            );
            missing.push(line.ingredient_id);
            continue;
        };

        let line_cost = to_decimal(ingredient.unit_cost) * to_decimal(line.quantity);
        total += line_cost;

        costed.push(CostedLine {
            ingredient_id: ingredient.id,
            name: ingredient.name.clone(),
            quantity: line.quantity,
            unit: line
                .unit
                .clone()
                .unwrap_or_else(|| ingredient.unit.clone()),
            unit_cost: ingredient.unit_cost,
            line_cost: round_cost(line_cost),
        });
    }

    let per_serving = if serves > 0 {
        total / Decimal::from(serves)
    } else {
        total
    };

    RecipeCostBreakdown {
        total_cost: round_cost(total),
        cost_per_serving: round_cost(per_serving),
        lines: costed,
        missing_ingredients: missing,
    }
}

/// Scale a single line quantity to an ordered amount: `quantity × ordered / serves`
pub fn scale_line_quantity(quantity: f64, ordered: i32, serves: i32) -> f64 {
    let scaled = to_decimal(quantity) * Decimal::from(ordered) / Decimal::from(serves);
    round_cost(scaled)
}
