//! Dish Cost Propagator
//!
//! Keeps `Recipe`, `RecipeIngredient`, `DishCost`, `DishIngredient` and
//! `FoodItem` mutually consistent whenever a recipe or its pricing changes.
//! All multi-table writes go through the store's transactional commits, so
//! a failure leaves the previous state fully intact and a retry with the
//! same input lands on the same final state.

use crate::db::{CostingStore, DishPricingCommit, RecipeSaveBatch, StoreError};
use crate::notify::Notifier;
use crate::services::recipe_cost::{RecipeLineInput, compute_recipe_cost};
use crate::utils::money::{round_money, to_decimal};
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_UNIT_COST, MAX_UNIT_LEN, require_finite, validate_non_negative,
    validate_quantity, validate_required_text,
};
use crate::utils::{CostingError, CostingResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    DEFAULT_PROFIT_MARGIN, DishCost, DishIngredient, Recipe, RecipeIngredient,
};
use shared::util::{now_millis, snowflake_id};
use std::collections::HashSet;
use std::sync::Arc;

/// Full replacement payload for a dish's recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSaveInput {
    pub food_item_id: i64,
    pub name: String,
    pub serves: i32,
    pub lines: Vec<RecipeLineInput>,
}

/// What a successful save produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSaveSummary {
    pub recipe_id: i64,
    pub dish_cost_id: i64,
    pub total_cost: f64,
    pub cost_per_serving: f64,
    pub suggested_price: f64,
    pub effective_price: f64,
    /// Lines dropped because their ingredient is gone from the catalog
    pub missing_ingredients: Vec<i64>,
}

/// Pricing-screen patch: overhead, margin, manual price pinning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DishPricingPatch {
    pub total_overhead_cost: Option<f64>,
    pub profit_margin: Option<f64>,
    pub use_manual_price: Option<bool>,
    pub manual_price: Option<f64>,
}

/// Reporting view: the dish cost plus its ingredient mirror
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishCostBreakdown {
    pub dish_cost: DishCost,
    pub ingredients: Vec<DishIngredient>,
}

/// Outcome of re-costing every recipe that uses an ingredient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientRefreshReport {
    pub ingredient_id: i64,
    /// Food item ids whose costs were re-propagated
    pub refreshed: Vec<i64>,
    /// Food item id → reason, for recipes that failed to refresh
    pub failed: Vec<(i64, String)>,
}

#[derive(Clone)]
pub struct DishCostService {
    store: Arc<dyn CostingStore>,
    notifier: Arc<dyn Notifier>,
}

impl DishCostService {
    pub fn new(store: Arc<dyn CostingStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Replace a dish's recipe and propagate costs to its dish-cost record
    /// and catalog entry.
    pub async fn save_recipe(&self, input: RecipeSaveInput) -> CostingResult<RecipeSaveSummary> {
        // 1. Validate the payload before touching storage
        if let Err(e) = validate_save_input(&input) {
            self.notifier
                .notify_error(&format!("Recipe save rejected: {e}"));
            return Err(e);
        }

        // 2-6. Compute and commit
        let result = self
            .propagate(input.food_item_id, &input.name, input.serves, &input.lines)
            .await;

        // 7. One-line feedback either way
        match &result {
            Ok(summary) => {
                let skipped = if summary.missing_ingredients.is_empty() {
                    String::new()
                } else {
                    format!(" ({} unknown ingredient(s) skipped)", summary.missing_ingredients.len())
                };
                self.notifier.notify_success(&format!(
                    "Recipe '{}' saved: cost {:.2}, price {:.2}{skipped}",
                    input.name, summary.total_cost, summary.effective_price
                ));
            }
            Err(e) => {
                self.notifier
                    .notify_error(&format!("Failed to save recipe '{}': {e}", input.name));
            }
        }
        result
    }

    /// Adjust overhead / margin / manual-price pinning and push the result
    /// onto the food item.
    pub async fn update_pricing(
        &self,
        food_item_id: i64,
        patch: DishPricingPatch,
    ) -> CostingResult<DishCost> {
        let result = self.apply_pricing(food_item_id, patch).await;
        match &result {
            Ok(dish) => self.notifier.notify_success(&format!(
                "Pricing updated for dish {food_item_id}: cost {:.2}, price {:.2}",
                dish.total_cost,
                dish.effective_price()
            )),
            Err(e) => self
                .notifier
                .notify_error(&format!("Failed to update pricing for dish {food_item_id}: {e}")),
        }
        result
    }

    /// The dish cost record plus its denormalized ingredient lines
    pub async fn breakdown(&self, food_item_id: i64) -> CostingResult<DishCostBreakdown> {
        let dish_cost = self
            .store
            .dish_cost_by_food_item(food_item_id)
            .await?
            .ok_or_else(|| CostingError::not_found(format!("Dish cost for food item {food_item_id}")))?;
        let ingredients = self.store.dish_ingredients(dish_cost.id).await?;
        Ok(DishCostBreakdown {
            dish_cost,
            ingredients,
        })
    }

    /// Re-cost every recipe that references the ingredient — the follow-up
    /// to a unit-cost edit. Per-recipe failures are collected; the rest
    /// still refresh.
    pub async fn refresh_for_ingredient(
        &self,
        ingredient_id: i64,
    ) -> CostingResult<IngredientRefreshReport> {
        let recipes = self.store.recipes_using_ingredient(ingredient_id).await?;
        let mut report = IngredientRefreshReport {
            ingredient_id,
            refreshed: Vec::new(),
            failed: Vec::new(),
        };

        for recipe in recipes {
            let outcome = self.refresh_recipe(&recipe).await;
            match outcome {
                Ok(()) => report.refreshed.push(recipe.food_item_id),
                Err(e) => {
                    tracing::warn!(
                        food_item_id = recipe.food_item_id,
                        error = %e,
                        "failed to re-cost recipe after ingredient change"
                    );
                    report.failed.push((recipe.food_item_id, e.to_string()));
                }
            }
        }

        if report.failed.is_empty() {
            self.notifier.notify_success(&format!(
                "Re-costed {} dish(es) after ingredient {ingredient_id} changed",
                report.refreshed.len()
            ));
        } else {
            self.notifier.notify_error(&format!(
                "Re-costing after ingredient {ingredient_id} change: {} dish(es) failed",
                report.failed.len()
            ));
        }
        Ok(report)
    }

    async fn refresh_recipe(&self, recipe: &Recipe) -> CostingResult<()> {
        let lines = self.store.recipe_ingredients(recipe.id).await?;
        let inputs: Vec<RecipeLineInput> = lines
            .iter()
            .map(|l| RecipeLineInput {
                ingredient_id: l.ingredient_id,
                quantity: l.quantity,
                unit: Some(l.unit.clone()),
            })
            .collect();
        self.propagate(recipe.food_item_id, &recipe.name, recipe.serves, &inputs)
            .await?;
        Ok(())
    }

    /// The propagation pipeline shared by saves and refreshes. Computes the
    /// complete target state, then commits it in one transaction.
    async fn propagate(
        &self,
        food_item_id: i64,
        name: &str,
        serves: i32,
        line_inputs: &[RecipeLineInput],
    ) -> CostingResult<RecipeSaveSummary> {
        // 2. The dish must exist in the catalog
        if self.store.food_item(food_item_id).await?.is_none() {
            return Err(CostingError::not_found(format!("Food item {food_item_id}")));
        }

        // 3. Resolve ingredients in one round trip and cost the lines
        let ids: Vec<i64> = line_inputs.iter().map(|l| l.ingredient_id).collect();
        let catalog = self
            .store
            .ingredients_by_ids(&ids)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        let breakdown = compute_recipe_cost(line_inputs, &catalog, serves);

        // 4. Upsert target for the recipe, replace-all for its lines
        let existing_recipe = self.store.recipe_by_food_item(food_item_id).await?;
        let recipe_is_new = existing_recipe.is_none();
        let recipe_id = existing_recipe.map(|r| r.id).unwrap_or_else(snowflake_id);
        let now = now_millis();

        let recipe = Recipe {
            id: recipe_id,
            food_item_id,
            name: name.to_string(),
            serves,
            total_cost: breakdown.total_cost,
            cost_per_serving: breakdown.cost_per_serving,
            updated_at: now,
        };
        let lines: Vec<RecipeIngredient> = breakdown
            .lines
            .iter()
            .map(|l| RecipeIngredient {
                id: snowflake_id(),
                recipe_id,
                ingredient_id: l.ingredient_id,
                quantity: l.quantity,
                unit: l.unit.clone(),
                line_cost: l.line_cost,
            })
            .collect();

        // 5. Merge into the dish cost: keep overhead/margin/manual pinning
        //    when the record exists, defaults otherwise
        let existing_dish = self.store.dish_cost_by_food_item(food_item_id).await?;
        let dish_is_new = existing_dish.is_none();
        let ingredient_cost = to_decimal(breakdown.total_cost);

        let dish_cost = match existing_dish {
            Some(existing) => {
                let total = round_money(ingredient_cost + to_decimal(existing.total_overhead_cost));
                DishCost {
                    total_ingredient_cost: breakdown.total_cost,
                    total_cost: total,
                    suggested_price: suggested_price_for(to_decimal(total), existing.profit_margin),
                    updated_at: now,
                    ..existing
                }
            }
            None => {
                let total = round_money(ingredient_cost);
                DishCost {
                    id: snowflake_id(),
                    food_item_id,
                    total_ingredient_cost: breakdown.total_cost,
                    total_overhead_cost: 0.0,
                    total_cost: total,
                    profit_margin: DEFAULT_PROFIT_MARGIN,
                    suggested_price: suggested_price_for(to_decimal(total), DEFAULT_PROFIT_MARGIN),
                    use_manual_price: false,
                    manual_price: None,
                    updated_at: now,
                }
            }
        };
        let effective_price = dish_cost.effective_price();

        let dish_lines: Vec<DishIngredient> = breakdown
            .lines
            .iter()
            .map(|l| DishIngredient {
                id: snowflake_id(),
                dish_cost_id: dish_cost.id,
                ingredient_id: l.ingredient_id,
                name: l.name.clone(),
                quantity: l.quantity,
                unit: l.unit.clone(),
                unit_cost: l.unit_cost,
                total_cost: l.line_cost,
            })
            .collect();

        // 6. One transaction: recipe + lines + dish cost + mirror + food item
        let summary = RecipeSaveSummary {
            recipe_id,
            dish_cost_id: dish_cost.id,
            total_cost: dish_cost.total_cost,
            cost_per_serving: breakdown.cost_per_serving,
            suggested_price: dish_cost.suggested_price,
            effective_price,
            missing_ingredients: breakdown.missing_ingredients,
        };
        self.store
            .commit_recipe_save(RecipeSaveBatch {
                recipe,
                recipe_is_new,
                lines,
                dish_cost: dish_cost.clone(),
                dish_is_new,
                dish_lines,
                food_item_cost: dish_cost.total_cost,
                food_item_price: effective_price,
            })
            .await
            .map_err(map_not_found)?;

        Ok(summary)
    }

    async fn apply_pricing(
        &self,
        food_item_id: i64,
        patch: DishPricingPatch,
    ) -> CostingResult<DishCost> {
        validate_pricing_patch(&patch)?;

        let mut dish = self
            .store
            .dish_cost_by_food_item(food_item_id)
            .await?
            .ok_or_else(|| CostingError::not_found(format!("Dish cost for food item {food_item_id}")))?;

        if let Some(overhead) = patch.total_overhead_cost {
            dish.total_overhead_cost = overhead;
        }
        if let Some(margin) = patch.profit_margin {
            dish.profit_margin = margin;
        }
        if let Some(use_manual) = patch.use_manual_price {
            dish.use_manual_price = use_manual;
        }
        if let Some(manual) = patch.manual_price {
            dish.manual_price = Some(manual);
        }

        // Invariant: total and suggested price always derive from the parts
        let total = round_money(
            to_decimal(dish.total_ingredient_cost) + to_decimal(dish.total_overhead_cost),
        );
        dish.total_cost = total;
        dish.suggested_price = suggested_price_for(to_decimal(total), dish.profit_margin);
        dish.updated_at = now_millis();

        let effective = dish.effective_price();
        self.store
            .commit_dish_pricing(DishPricingCommit {
                dish_cost: dish.clone(),
                food_item_cost: dish.total_cost,
                food_item_price: effective,
            })
            .await
            .map_err(map_not_found)?;

        Ok(dish)
    }
}

/// `total_cost / (1 - margin/100)`, zero for a zero cost. An out-of-range
/// margin on a stored row suggests zero rather than dividing by zero.
fn suggested_price_for(total_cost: Decimal, margin_percent: f64) -> f64 {
    if total_cost <= Decimal::ZERO {
        return 0.0;
    }
    let margin = to_decimal(margin_percent);
    if margin < Decimal::ZERO || margin >= Decimal::from(100) {
        tracing::warn!(margin = margin_percent, "profit margin out of range, suggesting zero");
        return 0.0;
    }
    round_money(total_cost / (Decimal::ONE - margin / Decimal::from(100)))
}

fn validate_save_input(input: &RecipeSaveInput) -> CostingResult<()> {
    validate_required_text(&input.name, "name", MAX_NAME_LEN)?;
    if input.serves <= 0 {
        return Err(CostingError::validation(format!(
            "serves must be positive, got {}",
            input.serves
        )));
    }
    let mut seen = HashSet::new();
    for line in &input.lines {
        validate_quantity(line.quantity, "line quantity")?;
        if let Some(ref unit) = line.unit {
            validate_required_text(unit, "line unit", MAX_UNIT_LEN)?;
        }
        if !seen.insert(line.ingredient_id) {
            return Err(CostingError::validation(format!(
                "duplicate ingredient {} in recipe lines",
                line.ingredient_id
            )));
        }
    }
    Ok(())
}

fn validate_pricing_patch(patch: &DishPricingPatch) -> CostingResult<()> {
    if let Some(overhead) = patch.total_overhead_cost {
        validate_non_negative(overhead, "total_overhead_cost", MAX_UNIT_COST)?;
    }
    if let Some(margin) = patch.profit_margin {
        require_finite(margin, "profit_margin")?;
        if !(0.0..100.0).contains(&margin) {
            return Err(CostingError::validation(format!(
                "profit_margin must be in [0, 100), got {margin}"
            )));
        }
    }
    if let Some(manual) = patch.manual_price {
        validate_non_negative(manual, "manual_price", MAX_UNIT_COST)?;
    }
    Ok(())
}

/// Store-level NotFound → service-level NotFound
fn map_not_found(err: StoreError) -> CostingError {
    match err {
        StoreError::NotFound(msg) => CostingError::NotFound(msg),
        other => CostingError::Persistence(other),
    }
}
