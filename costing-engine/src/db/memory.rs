//! In-memory storage adapter (同进程，测试用)
//!
//! Implements the same port as the SQLite adapter so services run against
//! it unchanged. Mutations take the write lock for their whole duration,
//! which gives the same atomicity the SQLite adapter gets from conditional
//! updates and transactions. Nothing is held across an await.

use super::store::{
    CostingStore, DishPricingCommit, RecipeSaveBatch, STOCK_EPSILON, StockMovement, StoreError,
    StoreResult,
};
use crate::utils::money::{to_decimal, to_f64};
use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use shared::models::{
    DishCost, DishIngredient, FoodItem, Ingredient, IngredientUpdate, InventoryTransaction,
    Recipe, RecipeIngredient,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Tables {
    ingredients: HashMap<i64, Ingredient>,
    recipes: HashMap<i64, Recipe>,
    recipe_ingredients: Vec<RecipeIngredient>,
    dish_costs: HashMap<i64, DishCost>,
    dish_ingredients: Vec<DishIngredient>,
    food_items: HashMap<i64, FoodItem>,
    transactions: Vec<InventoryTransaction>,
}

/// In-process store, drop-in for [`super::SqliteStore`] in tests and demos
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Fault injection: when set, `append_transaction` fails. Lets tests
    /// exercise the ledger's best-effort logging path.
    fail_transaction_log: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `append_transaction` fail (or succeed again)
    pub fn set_fail_transaction_log(&self, fail: bool) {
        self.fail_transaction_log.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CostingStore for MemoryStore {
    // ── Ingredient catalog ──────────────────────────────────────────

    async fn ingredient(&self, id: i64) -> StoreResult<Option<Ingredient>> {
        Ok(self.tables.read().ingredients.get(&id).cloned())
    }

    async fn ingredients_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<Ingredient>> {
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.ingredients.get(id).cloned())
            .collect())
    }

    async fn all_ingredients(&self) -> StoreResult<Vec<Ingredient>> {
        let tables = self.tables.read();
        let mut rows: Vec<Ingredient> = tables
            .ingredients
            .values()
            .filter(|i| i.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn ingredients_below_reorder(&self) -> StoreResult<Vec<Ingredient>> {
        let tables = self.tables.read();
        let mut rows: Vec<Ingredient> = tables
            .ingredients
            .values()
            .filter(|i| i.is_active && i.stock_quantity <= i.reorder_level)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn insert_ingredient(&self, ingredient: Ingredient) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.ingredients.contains_key(&ingredient.id) {
            return Err(StoreError::Database(format!(
                "Ingredient {} already exists",
                ingredient.id
            )));
        }
        tables.ingredients.insert(ingredient.id, ingredient);
        Ok(())
    }

    async fn update_ingredient(&self, id: i64, patch: IngredientUpdate) -> StoreResult<Ingredient> {
        let mut tables = self.tables.write();
        let row = tables
            .ingredients
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Ingredient {id} not found")))?;
        if let Some(name) = patch.name {
            row.name = name;
        }
        if let Some(unit) = patch.unit {
            row.unit = unit;
        }
        if let Some(unit_cost) = patch.unit_cost {
            row.unit_cost = unit_cost;
        }
        if let Some(reorder_level) = patch.reorder_level {
            row.reorder_level = reorder_level;
        }
        if let Some(is_active) = patch.is_active {
            row.is_active = is_active;
        }
        Ok(row.clone())
    }

    async fn delete_ingredient(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.ingredients.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("Ingredient {id} not found")));
        }
        Ok(())
    }

    async fn apply_stock_delta(&self, ingredient_id: i64, delta: f64) -> StoreResult<StockMovement> {
        // Whole check-and-apply under the write lock — mirrors the SQLite
        // adapter's single conditional UPDATE.
        let mut tables = self.tables.write();
        let row = tables
            .ingredients
            .get_mut(&ingredient_id)
            .ok_or_else(|| StoreError::NotFound(format!("Ingredient {ingredient_id} not found")))?;

        let previous = row.stock_quantity;
        let new = to_decimal(previous) + to_decimal(delta);
        if new < -to_decimal(STOCK_EPSILON) {
            return Err(StoreError::InsufficientStock {
                ingredient_id,
                available: previous,
            });
        }
        let new_quantity = to_f64(new.max(Decimal::ZERO));
        row.stock_quantity = new_quantity;
        Ok(StockMovement {
            ingredient_id,
            unit: row.unit.clone(),
            previous_quantity: previous,
            new_quantity,
        })
    }

    async fn set_stock_level(&self, ingredient_id: i64, level: f64) -> StoreResult<StockMovement> {
        let mut tables = self.tables.write();
        let row = tables
            .ingredients
            .get_mut(&ingredient_id)
            .ok_or_else(|| StoreError::NotFound(format!("Ingredient {ingredient_id} not found")))?;
        let previous = row.stock_quantity;
        row.stock_quantity = level;
        Ok(StockMovement {
            ingredient_id,
            unit: row.unit.clone(),
            previous_quantity: previous,
            new_quantity: level,
        })
    }

    // ── Recipes ─────────────────────────────────────────────────────

    async fn recipe_by_food_item(&self, food_item_id: i64) -> StoreResult<Option<Recipe>> {
        let tables = self.tables.read();
        Ok(tables
            .recipes
            .values()
            .find(|r| r.food_item_id == food_item_id)
            .cloned())
    }

    async fn recipe_ingredients(&self, recipe_id: i64) -> StoreResult<Vec<RecipeIngredient>> {
        let tables = self.tables.read();
        Ok(tables
            .recipe_ingredients
            .iter()
            .filter(|l| l.recipe_id == recipe_id)
            .cloned()
            .collect())
    }

    async fn recipes_using_ingredient(&self, ingredient_id: i64) -> StoreResult<Vec<Recipe>> {
        let tables = self.tables.read();
        let mut rows: Vec<Recipe> = tables
            .recipes
            .values()
            .filter(|r| {
                tables
                    .recipe_ingredients
                    .iter()
                    .any(|l| l.recipe_id == r.id && l.ingredient_id == ingredient_id)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    // ── Dish costs ──────────────────────────────────────────────────

    async fn dish_cost_by_food_item(&self, food_item_id: i64) -> StoreResult<Option<DishCost>> {
        let tables = self.tables.read();
        Ok(tables
            .dish_costs
            .values()
            .find(|d| d.food_item_id == food_item_id)
            .cloned())
    }

    async fn dish_ingredients(&self, dish_cost_id: i64) -> StoreResult<Vec<DishIngredient>> {
        let tables = self.tables.read();
        Ok(tables
            .dish_ingredients
            .iter()
            .filter(|l| l.dish_cost_id == dish_cost_id)
            .cloned()
            .collect())
    }

    // ── Food items ──────────────────────────────────────────────────

    async fn food_item(&self, id: i64) -> StoreResult<Option<FoodItem>> {
        Ok(self.tables.read().food_items.get(&id).cloned())
    }

    async fn insert_food_item(&self, item: FoodItem) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.food_items.contains_key(&item.id) {
            return Err(StoreError::Database(format!(
                "Food item {} already exists",
                item.id
            )));
        }
        tables.food_items.insert(item.id, item);
        Ok(())
    }

    // ── Transactional commits ───────────────────────────────────────

    async fn commit_recipe_save(&self, batch: RecipeSaveBatch) -> StoreResult<()> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;

        // Resolve the food item first so nothing is applied on failure
        let food_item_id = batch.recipe.food_item_id;
        let item = tables
            .food_items
            .get_mut(&food_item_id)
            .ok_or_else(|| StoreError::NotFound(format!("Food item {food_item_id} not found")))?;

        tables.recipes.insert(batch.recipe.id, batch.recipe.clone());

        tables
            .recipe_ingredients
            .retain(|l| l.recipe_id != batch.recipe.id);
        tables.recipe_ingredients.extend(batch.lines.iter().cloned());

        tables
            .dish_costs
            .insert(batch.dish_cost.id, batch.dish_cost.clone());

        tables
            .dish_ingredients
            .retain(|l| l.dish_cost_id != batch.dish_cost.id);
        tables
            .dish_ingredients
            .extend(batch.dish_lines.iter().cloned());

        item.cost = batch.food_item_cost;
        item.price = batch.food_item_price;

        Ok(())
    }

    async fn commit_dish_pricing(&self, commit: DishPricingCommit) -> StoreResult<()> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;

        if !tables.dish_costs.contains_key(&commit.dish_cost.id) {
            return Err(StoreError::NotFound(format!(
                "Dish cost {} not found",
                commit.dish_cost.id
            )));
        }
        let food_item_id = commit.dish_cost.food_item_id;
        let item = tables
            .food_items
            .get_mut(&food_item_id)
            .ok_or_else(|| StoreError::NotFound(format!("Food item {food_item_id} not found")))?;

        tables
            .dish_costs
            .insert(commit.dish_cost.id, commit.dish_cost.clone());
        item.cost = commit.food_item_cost;
        item.price = commit.food_item_price;

        Ok(())
    }

    // ── Inventory ledger ────────────────────────────────────────────

    async fn append_transaction(&self, entry: InventoryTransaction) -> StoreResult<()> {
        if self.fail_transaction_log.load(Ordering::SeqCst) {
            return Err(StoreError::Database(
                "transaction log unavailable (injected fault)".to_string(),
            ));
        }
        self.tables.write().transactions.push(entry);
        Ok(())
    }

    async fn transactions_for_ingredient(
        &self,
        ingredient_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<InventoryTransaction>> {
        let tables = self.tables.read();
        let mut rows: Vec<InventoryTransaction> = tables
            .transactions
            .iter()
            .filter(|t| t.ingredient_id == ingredient_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}
