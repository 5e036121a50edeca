//! Order Fulfillment Deductor
//!
//! Scales a dish's recipe by `ordered / serves` and drives the stock ledger
//! to consume ingredients. What happens when a line fails is a named policy
//! ([`DeductionPolicy`]), not a fall-through: best-effort keeps going and
//! reports, all-or-nothing compensates the lines already applied and fails.

use crate::core::DeductionPolicy;
use crate::db::CostingStore;
use crate::notify::Notifier;
use crate::services::recipe_cost::scale_line_quantity;
use crate::services::stock_ledger::StockLedger;
use crate::utils::{CostingError, CostingResult};
use serde::{Deserialize, Serialize};
use shared::models::TransactionType;
use std::sync::Arc;

/// One successfully deducted line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionLine {
    pub ingredient_id: i64,
    pub needed_quantity: f64,
    pub previous_quantity: f64,
    pub new_quantity: f64,
}

/// One failed line (best-effort mode keeps these in the report)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionFailure {
    pub ingredient_id: i64,
    pub needed_quantity: f64,
    pub reason: String,
}

/// Outcome of deducting one order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionReport {
    pub food_item_id: i64,
    pub ordered_quantity: i32,
    /// False when the dish has no recipe — nothing to deduct, not an error
    pub recipe_found: bool,
    pub deducted: Vec<DeductionLine>,
    pub failures: Vec<DeductionFailure>,
}

impl DeductionReport {
    fn empty(food_item_id: i64, ordered_quantity: i32) -> Self {
        Self {
            food_item_id,
            ordered_quantity,
            recipe_found: false,
            deducted: Vec::new(),
            failures: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct OrderDeductor {
    store: Arc<dyn CostingStore>,
    ledger: StockLedger,
    notifier: Arc<dyn Notifier>,
    policy: DeductionPolicy,
}

impl OrderDeductor {
    pub fn new(
        store: Arc<dyn CostingStore>,
        notifier: Arc<dyn Notifier>,
        policy: DeductionPolicy,
    ) -> Self {
        let ledger = StockLedger::new(store.clone(), notifier.clone());
        Self {
            store,
            ledger,
            notifier,
            policy,
        }
    }

    /// Deduct the ingredients consumed by `ordered_quantity` servings of a
    /// dish.
    pub async fn deduct(
        &self,
        food_item_id: i64,
        ordered_quantity: i32,
    ) -> CostingResult<DeductionReport> {
        // 1. Validate the ordered quantity
        if ordered_quantity <= 0 {
            return Err(CostingError::validation(format!(
                "ordered quantity must be positive, got {ordered_quantity}"
            )));
        }

        // 2. Load the recipe; no recipe means nothing to deduct
        let Some(recipe) = self.store.recipe_by_food_item(food_item_id).await? else {
            tracing::debug!(food_item_id, "no recipe, skipping stock deduction");
            return Ok(DeductionReport::empty(food_item_id, ordered_quantity));
        };
        if recipe.serves <= 0 {
            return Err(CostingError::validation(format!(
                "recipe {} has a non-positive serving count",
                recipe.id
            )));
        }

        // 3. Scale and consume each line
        let lines = self.store.recipe_ingredients(recipe.id).await?;
        let mut report = DeductionReport {
            recipe_found: true,
            ..DeductionReport::empty(food_item_id, ordered_quantity)
        };

        for line in &lines {
            let needed = scale_line_quantity(line.quantity, ordered_quantity, recipe.serves);
            if needed <= 0.0 {
                continue;
            }

            match self.ledger.consume(line.ingredient_id, needed, food_item_id).await {
                Ok(adjustment) => report.deducted.push(DeductionLine {
                    ingredient_id: line.ingredient_id,
                    needed_quantity: needed,
                    previous_quantity: adjustment.movement.previous_quantity,
                    new_quantity: adjustment.movement.new_quantity,
                }),
                Err(e) => match self.policy {
                    DeductionPolicy::BestEffort => {
                        tracing::warn!(
                            ingredient_id = line.ingredient_id,
                            needed,
                            error = %e,
                            "stock deduction failed for ingredient, continuing"
                        );
                        report.failures.push(DeductionFailure {
                            ingredient_id: line.ingredient_id,
                            needed_quantity: needed,
                            reason: e.to_string(),
                        });
                    }
                    DeductionPolicy::AllOrNothing => {
                        self.compensate(&report.deducted, food_item_id).await;
                        self.notifier.notify_error(&format!(
                            "Stock deduction rolled back for {ordered_quantity}× item {food_item_id}: {e}"
                        ));
                        return Err(e);
                    }
                },
            }
        }

        // 4. Report the aggregate outcome
        if report.failures.is_empty() {
            tracing::info!(
                food_item_id,
                ordered_quantity,
                lines = report.deducted.len(),
                "stock deducted for order line"
            );
        } else {
            self.notifier.notify_error(&format!(
                "Stock deduction incomplete for {ordered_quantity}× item {food_item_id}: \
                 {} of {} ingredients failed",
                report.failures.len(),
                report.deducted.len() + report.failures.len()
            ));
        }
        Ok(report)
    }

    /// Reverse the movements already applied (all-or-nothing rollback).
    /// Compensation failures are logged and skipped — there is no further
    /// recourse at this layer.
    async fn compensate(&self, applied: &[DeductionLine], food_item_id: i64) {
        for line in applied.iter().rev() {
            if let Err(e) = self
                .ledger
                .adjust(
                    line.ingredient_id,
                    line.needed_quantity,
                    TransactionType::Adjustment,
                    Some(format!("deduction rollback for food item {food_item_id}")),
                    Some((food_item_id, "food_item")),
                )
                .await
            {
                tracing::error!(
                    ingredient_id = line.ingredient_id,
                    error = %e,
                    "failed to compensate stock deduction"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::notify::RecordingNotifier;
    use shared::models::{FoodItem, Ingredient, Recipe, RecipeIngredient};
    use shared::util::now_millis;

    const DISH: i64 = 100;

    async fn seed(store: &MemoryStore, stock_a: f64, stock_b: f64) {
        for (id, name, stock) in [(1, "Flour", stock_a), (2, "Salt", stock_b)] {
            store
                .insert_ingredient(Ingredient {
                    id,
                    name: name.to_string(),
                    unit: "kg".to_string(),
                    unit_cost: 1.0,
                    stock_quantity: stock,
                    reorder_level: 0.0,
                    is_active: true,
                })
                .await
                .unwrap();
        }
        store
            .insert_food_item(FoodItem {
                id: DISH,
                name: "Bread".to_string(),
                cost: 0.0,
                price: 0.0,
                is_active: true,
            })
            .await
            .unwrap();
        // Recipe serving 4: 2kg flour, 4kg salt
        store
            .commit_recipe_save(crate::db::RecipeSaveBatch {
                recipe: Recipe {
                    id: 10,
                    food_item_id: DISH,
                    name: "Bread".to_string(),
                    serves: 4,
                    total_cost: 6.0,
                    cost_per_serving: 1.5,
                    updated_at: now_millis(),
                },
                recipe_is_new: true,
                lines: vec![
                    RecipeIngredient {
                        id: 11,
                        recipe_id: 10,
                        ingredient_id: 1,
                        quantity: 2.0,
                        unit: "kg".to_string(),
                        line_cost: 2.0,
                    },
                    RecipeIngredient {
                        id: 12,
                        recipe_id: 10,
                        ingredient_id: 2,
                        quantity: 4.0,
                        unit: "kg".to_string(),
                        line_cost: 4.0,
                    },
                ],
                dish_cost: shared::models::DishCost {
                    id: 20,
                    food_item_id: DISH,
                    total_ingredient_cost: 6.0,
                    total_overhead_cost: 0.0,
                    total_cost: 6.0,
                    profit_margin: 70.0,
                    suggested_price: 20.0,
                    use_manual_price: false,
                    manual_price: None,
                    updated_at: now_millis(),
                },
                dish_is_new: true,
                dish_lines: vec![],
                food_item_cost: 6.0,
                food_item_price: 20.0,
            })
            .await
            .unwrap();
    }

    fn deductor(store: Arc<MemoryStore>, policy: DeductionPolicy) -> (OrderDeductor, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        (OrderDeductor::new(store, notifier.clone(), policy), notifier)
    }

    #[tokio::test]
    async fn test_deduct_scales_by_serves() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 10.0, 10.0).await;
        let (deductor, _) = deductor(store.clone(), DeductionPolicy::BestEffort);

        // 3 ordered of a serves-4 recipe: flour 2*3/4 = 1.5, salt 4*3/4 = 3
        let report = deductor.deduct(DISH, 3).await.unwrap();
        assert!(report.recipe_found);
        assert_eq!(report.deducted.len(), 2);
        assert!(report.failures.is_empty());
        assert_eq!(store.ingredient(1).await.unwrap().unwrap().stock_quantity, 8.5);
        assert_eq!(store.ingredient(2).await.unwrap().unwrap().stock_quantity, 7.0);
    }

    #[tokio::test]
    async fn test_no_recipe_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let (deductor, notifier) = deductor(store, DeductionPolicy::BestEffort);

        let report = deductor.deduct(999, 2).await.unwrap();
        assert!(!report.recipe_found);
        assert!(report.deducted.is_empty());
        assert!(notifier.error_messages().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejected_and_stock_unchanged() {
        let store = Arc::new(MemoryStore::new());
        // Salt line needs 4 for one full recipe but only 3 in stock
        seed(&store, 10.0, 3.0).await;
        let (deductor, notifier) = deductor(store.clone(), DeductionPolicy::BestEffort);

        let report = deductor.deduct(DISH, 4).await.unwrap();
        assert_eq!(report.deducted.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ingredient_id, 2);
        // Failing line untouched, other line deducted (best-effort)
        assert_eq!(store.ingredient(2).await.unwrap().unwrap().stock_quantity, 3.0);
        assert_eq!(store.ingredient(1).await.unwrap().unwrap().stock_quantity, 8.0);
        assert_eq!(notifier.error_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_all_or_nothing_compensates() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 10.0, 3.0).await;
        let (deductor, _) = deductor(store.clone(), DeductionPolicy::AllOrNothing);

        let err = deductor.deduct(DISH, 4).await.unwrap_err();
        assert!(matches!(err, CostingError::NegativeStock { .. }));
        // The flour deduction was reversed
        assert_eq!(store.ingredient(1).await.unwrap().unwrap().stock_quantity, 10.0);
        assert_eq!(store.ingredient(2).await.unwrap().unwrap().stock_quantity, 3.0);
    }

    #[tokio::test]
    async fn test_rejects_nonpositive_quantity() {
        let store = Arc::new(MemoryStore::new());
        let (deductor, _) = deductor(store, DeductionPolicy::BestEffort);
        assert!(matches!(
            deductor.deduct(DISH, 0).await,
            Err(CostingError::Validation(_))
        ));
    }
}
