//! SQLite storage adapter (sqlx)
//!
//! Every call runs under a bounded deadline; a miss surfaces as
//! [`StoreError::Timeout`] so callers can tell a slow store from a broken
//! one. Multi-table writes go through real transactions.

use super::store::{
    CostingStore, DishPricingCommit, RecipeSaveBatch, StockMovement, StoreError, StoreResult,
};
use crate::utils::money::{round_cost, to_decimal};
use rust_decimal::Decimal;
use async_trait::async_trait;
use shared::models::{
    DishCost, DishIngredient, FoodItem, Ingredient, IngredientUpdate, InventoryTransaction,
    Recipe, RecipeIngredient,
};
use sqlx::SqlitePool;
use std::future::Future;
use std::time::Duration;

/// Default per-call deadline (ms); see `Config::storage_timeout_ms`
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

const INGREDIENT_COLUMNS: &str =
    "id, name, unit, unit_cost, stock_quantity, reorder_level, is_active";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    timeout_ms: u64,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_timeout(pool, DEFAULT_TIMEOUT_MS)
    }

    pub fn with_timeout(pool: SqlitePool, timeout_ms: u64) -> Self {
        Self { pool, timeout_ms }
    }

    /// Run a storage call under the configured deadline
    async fn guard<T, F>(&self, op: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let timeout_ms = self.timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout { op, timeout_ms }),
        }
    }
}

#[async_trait]
impl CostingStore for SqliteStore {
    // ── Ingredient catalog ──────────────────────────────────────────

    async fn ingredient(&self, id: i64) -> StoreResult<Option<Ingredient>> {
        self.guard("ingredient", async {
            let row = sqlx::query_as::<_, Ingredient>(&format!(
                "SELECT {INGREDIENT_COLUMNS} FROM ingredient WHERE id = ?"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        })
        .await
    }

    async fn ingredients_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<Ingredient>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.guard("ingredients_by_ids", async {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "SELECT {INGREDIENT_COLUMNS} FROM ingredient WHERE id IN ({placeholders})"
            );
            let mut query = sqlx::query_as::<_, Ingredient>(&sql);
            for id in ids {
                query = query.bind(*id);
            }
            let rows = query.fetch_all(&self.pool).await?;
            Ok(rows)
        })
        .await
    }

    async fn all_ingredients(&self) -> StoreResult<Vec<Ingredient>> {
        self.guard("all_ingredients", async {
            let rows = sqlx::query_as::<_, Ingredient>(&format!(
                "SELECT {INGREDIENT_COLUMNS} FROM ingredient WHERE is_active = 1 ORDER BY name"
            ))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        })
        .await
    }

    async fn ingredients_below_reorder(&self) -> StoreResult<Vec<Ingredient>> {
        self.guard("ingredients_below_reorder", async {
            let rows = sqlx::query_as::<_, Ingredient>(&format!(
                "SELECT {INGREDIENT_COLUMNS} FROM ingredient \
                 WHERE is_active = 1 AND stock_quantity <= reorder_level ORDER BY name"
            ))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        })
        .await
    }

    async fn insert_ingredient(&self, ingredient: Ingredient) -> StoreResult<()> {
        self.guard("insert_ingredient", async {
            sqlx::query(
                "INSERT INTO ingredient \
                 (id, name, unit, unit_cost, stock_quantity, reorder_level, is_active) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(ingredient.id)
            .bind(&ingredient.name)
            .bind(&ingredient.unit)
            .bind(ingredient.unit_cost)
            .bind(ingredient.stock_quantity)
            .bind(ingredient.reorder_level)
            .bind(ingredient.is_active)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn update_ingredient(&self, id: i64, patch: IngredientUpdate) -> StoreResult<Ingredient> {
        self.guard("update_ingredient", async {
            let rows = sqlx::query(
                "UPDATE ingredient SET \
                 name = COALESCE(?1, name), \
                 unit = COALESCE(?2, unit), \
                 unit_cost = COALESCE(?3, unit_cost), \
                 reorder_level = COALESCE(?4, reorder_level), \
                 is_active = COALESCE(?5, is_active) \
                 WHERE id = ?6",
            )
            .bind(&patch.name)
            .bind(&patch.unit)
            .bind(patch.unit_cost)
            .bind(patch.reorder_level)
            .bind(patch.is_active)
            .bind(id)
            .execute(&self.pool)
            .await?;
            if rows.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("Ingredient {id} not found")));
            }
            let row = sqlx::query_as::<_, Ingredient>(&format!(
                "SELECT {INGREDIENT_COLUMNS} FROM ingredient WHERE id = ?"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            row.ok_or_else(|| StoreError::NotFound(format!("Ingredient {id} not found")))
        })
        .await
    }

    async fn delete_ingredient(&self, id: i64) -> StoreResult<()> {
        self.guard("delete_ingredient", async {
            let rows = sqlx::query("DELETE FROM ingredient WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if rows.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("Ingredient {id} not found")));
            }
            Ok(())
        })
        .await
    }

    async fn apply_stock_delta(&self, ingredient_id: i64, delta: f64) -> StoreResult<StockMovement> {
        self.guard("apply_stock_delta", async {
            // 单条件更新：无 read-modify-write 窗口，负库存在语句内拒绝。
            // MAX(…, 0) clamps float noise from the REAL column.
            let updated = sqlx::query_as::<_, (f64, String)>(
                "UPDATE ingredient \
                 SET stock_quantity = MAX(stock_quantity + ?1, 0.0) \
                 WHERE id = ?2 AND stock_quantity + ?1 >= -1.0e-9 \
                 RETURNING stock_quantity, unit",
            )
            .bind(delta)
            .bind(ingredient_id)
            .fetch_optional(&self.pool)
            .await?;

            match updated {
                Some((new_quantity, unit)) => {
                    let previous =
                        round_cost((to_decimal(new_quantity) - to_decimal(delta)).max(Decimal::ZERO));
                    Ok(StockMovement {
                        ingredient_id,
                        unit,
                        previous_quantity: previous,
                        new_quantity,
                    })
                }
                None => {
                    // Rejected or missing — read once to tell the two apart
                    let current = sqlx::query_as::<_, (f64,)>(
                        "SELECT stock_quantity FROM ingredient WHERE id = ?",
                    )
                    .bind(ingredient_id)
                    .fetch_optional(&self.pool)
                    .await?;
                    match current {
                        Some((available,)) => Err(StoreError::InsufficientStock {
                            ingredient_id,
                            available,
                        }),
                        None => Err(StoreError::NotFound(format!(
                            "Ingredient {ingredient_id} not found"
                        ))),
                    }
                }
            }
        })
        .await
    }

    async fn set_stock_level(&self, ingredient_id: i64, level: f64) -> StoreResult<StockMovement> {
        self.guard("set_stock_level", async {
            let mut tx = self.pool.begin().await?;
            let current = sqlx::query_as::<_, (f64, String)>(
                "SELECT stock_quantity, unit FROM ingredient WHERE id = ?",
            )
            .bind(ingredient_id)
            .fetch_optional(&mut *tx)
            .await?;
            let Some((previous_quantity, unit)) = current else {
                return Err(StoreError::NotFound(format!(
                    "Ingredient {ingredient_id} not found"
                )));
            };
            sqlx::query("UPDATE ingredient SET stock_quantity = ?1 WHERE id = ?2")
                .bind(level)
                .bind(ingredient_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(StockMovement {
                ingredient_id,
                unit,
                previous_quantity,
                new_quantity: level,
            })
        })
        .await
    }

    // ── Recipes ─────────────────────────────────────────────────────

    async fn recipe_by_food_item(&self, food_item_id: i64) -> StoreResult<Option<Recipe>> {
        self.guard("recipe_by_food_item", async {
            let row = sqlx::query_as::<_, Recipe>(
                "SELECT id, food_item_id, name, serves, total_cost, cost_per_serving, updated_at \
                 FROM recipe WHERE food_item_id = ?",
            )
            .bind(food_item_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        })
        .await
    }

    async fn recipe_ingredients(&self, recipe_id: i64) -> StoreResult<Vec<RecipeIngredient>> {
        self.guard("recipe_ingredients", async {
            let rows = sqlx::query_as::<_, RecipeIngredient>(
                "SELECT id, recipe_id, ingredient_id, quantity, unit, line_cost \
                 FROM recipe_ingredient WHERE recipe_id = ? ORDER BY id",
            )
            .bind(recipe_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        })
        .await
    }

    async fn recipes_using_ingredient(&self, ingredient_id: i64) -> StoreResult<Vec<Recipe>> {
        self.guard("recipes_using_ingredient", async {
            let rows = sqlx::query_as::<_, Recipe>(
                "SELECT id, food_item_id, name, serves, total_cost, cost_per_serving, updated_at \
                 FROM recipe WHERE id IN \
                 (SELECT DISTINCT recipe_id FROM recipe_ingredient WHERE ingredient_id = ?) \
                 ORDER BY id",
            )
            .bind(ingredient_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        })
        .await
    }

    // ── Dish costs ──────────────────────────────────────────────────

    async fn dish_cost_by_food_item(&self, food_item_id: i64) -> StoreResult<Option<DishCost>> {
        self.guard("dish_cost_by_food_item", async {
            let row = sqlx::query_as::<_, DishCost>(
                "SELECT id, food_item_id, total_ingredient_cost, total_overhead_cost, total_cost, \
                 profit_margin, suggested_price, use_manual_price, manual_price, updated_at \
                 FROM dish_cost WHERE food_item_id = ?",
            )
            .bind(food_item_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        })
        .await
    }

    async fn dish_ingredients(&self, dish_cost_id: i64) -> StoreResult<Vec<DishIngredient>> {
        self.guard("dish_ingredients", async {
            let rows = sqlx::query_as::<_, DishIngredient>(
                "SELECT id, dish_cost_id, ingredient_id, name, quantity, unit, unit_cost, total_cost \
                 FROM dish_ingredient WHERE dish_cost_id = ? ORDER BY id",
            )
            .bind(dish_cost_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        })
        .await
    }

    // ── Food items ──────────────────────────────────────────────────

    async fn food_item(&self, id: i64) -> StoreResult<Option<FoodItem>> {
        self.guard("food_item", async {
            let row = sqlx::query_as::<_, FoodItem>(
                "SELECT id, name, cost, price, is_active FROM food_item WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        })
        .await
    }

    async fn insert_food_item(&self, item: FoodItem) -> StoreResult<()> {
        self.guard("insert_food_item", async {
            sqlx::query(
                "INSERT INTO food_item (id, name, cost, price, is_active) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(item.id)
            .bind(&item.name)
            .bind(item.cost)
            .bind(item.price)
            .bind(item.is_active)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    // ── Transactional commits ───────────────────────────────────────

    async fn commit_recipe_save(&self, batch: RecipeSaveBatch) -> StoreResult<()> {
        self.guard("commit_recipe_save", async {
            let mut tx = self.pool.begin().await?;

            // 1. Upsert recipe
            if batch.recipe_is_new {
                sqlx::query(
                    "INSERT INTO recipe \
                     (id, food_item_id, name, serves, total_cost, cost_per_serving, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(batch.recipe.id)
                .bind(batch.recipe.food_item_id)
                .bind(&batch.recipe.name)
                .bind(batch.recipe.serves)
                .bind(batch.recipe.total_cost)
                .bind(batch.recipe.cost_per_serving)
                .bind(batch.recipe.updated_at)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query(
                    "UPDATE recipe SET name = ?1, serves = ?2, total_cost = ?3, \
                     cost_per_serving = ?4, updated_at = ?5 WHERE id = ?6",
                )
                .bind(&batch.recipe.name)
                .bind(batch.recipe.serves)
                .bind(batch.recipe.total_cost)
                .bind(batch.recipe.cost_per_serving)
                .bind(batch.recipe.updated_at)
                .bind(batch.recipe.id)
                .execute(&mut *tx)
                .await?;
            }

            // 2. Replace-all recipe lines
            sqlx::query("DELETE FROM recipe_ingredient WHERE recipe_id = ?")
                .bind(batch.recipe.id)
                .execute(&mut *tx)
                .await?;
            for line in &batch.lines {
                sqlx::query(
                    "INSERT INTO recipe_ingredient \
                     (id, recipe_id, ingredient_id, quantity, unit, line_cost) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(line.id)
                .bind(line.recipe_id)
                .bind(line.ingredient_id)
                .bind(line.quantity)
                .bind(&line.unit)
                .bind(line.line_cost)
                .execute(&mut *tx)
                .await?;
            }

            // 3. Upsert dish cost
            if batch.dish_is_new {
                sqlx::query(
                    "INSERT INTO dish_cost \
                     (id, food_item_id, total_ingredient_cost, total_overhead_cost, total_cost, \
                      profit_margin, suggested_price, use_manual_price, manual_price, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(batch.dish_cost.id)
                .bind(batch.dish_cost.food_item_id)
                .bind(batch.dish_cost.total_ingredient_cost)
                .bind(batch.dish_cost.total_overhead_cost)
                .bind(batch.dish_cost.total_cost)
                .bind(batch.dish_cost.profit_margin)
                .bind(batch.dish_cost.suggested_price)
                .bind(batch.dish_cost.use_manual_price)
                .bind(batch.dish_cost.manual_price)
                .bind(batch.dish_cost.updated_at)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query(
                    "UPDATE dish_cost SET total_ingredient_cost = ?1, total_overhead_cost = ?2, \
                     total_cost = ?3, profit_margin = ?4, suggested_price = ?5, \
                     use_manual_price = ?6, manual_price = ?7, updated_at = ?8 WHERE id = ?9",
                )
                .bind(batch.dish_cost.total_ingredient_cost)
                .bind(batch.dish_cost.total_overhead_cost)
                .bind(batch.dish_cost.total_cost)
                .bind(batch.dish_cost.profit_margin)
                .bind(batch.dish_cost.suggested_price)
                .bind(batch.dish_cost.use_manual_price)
                .bind(batch.dish_cost.manual_price)
                .bind(batch.dish_cost.updated_at)
                .bind(batch.dish_cost.id)
                .execute(&mut *tx)
                .await?;
            }

            // 4. Replace-all dish ingredient mirror
            sqlx::query("DELETE FROM dish_ingredient WHERE dish_cost_id = ?")
                .bind(batch.dish_cost.id)
                .execute(&mut *tx)
                .await?;
            for line in &batch.dish_lines {
                sqlx::query(
                    "INSERT INTO dish_ingredient \
                     (id, dish_cost_id, ingredient_id, name, quantity, unit, unit_cost, total_cost) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(line.id)
                .bind(line.dish_cost_id)
                .bind(line.ingredient_id)
                .bind(&line.name)
                .bind(line.quantity)
                .bind(&line.unit)
                .bind(line.unit_cost)
                .bind(line.total_cost)
                .execute(&mut *tx)
                .await?;
            }

            // 5. Push cost/price onto the food item
            let rows = sqlx::query("UPDATE food_item SET cost = ?1, price = ?2 WHERE id = ?3")
                .bind(batch.food_item_cost)
                .bind(batch.food_item_price)
                .bind(batch.recipe.food_item_id)
                .execute(&mut *tx)
                .await?;
            if rows.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!(
                    "Food item {} not found",
                    batch.recipe.food_item_id
                )));
            }

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn commit_dish_pricing(&self, commit: DishPricingCommit) -> StoreResult<()> {
        self.guard("commit_dish_pricing", async {
            let mut tx = self.pool.begin().await?;

            let rows = sqlx::query(
                "UPDATE dish_cost SET total_overhead_cost = ?1, total_cost = ?2, \
                 profit_margin = ?3, suggested_price = ?4, use_manual_price = ?5, \
                 manual_price = ?6, updated_at = ?7 WHERE id = ?8",
            )
            .bind(commit.dish_cost.total_overhead_cost)
            .bind(commit.dish_cost.total_cost)
            .bind(commit.dish_cost.profit_margin)
            .bind(commit.dish_cost.suggested_price)
            .bind(commit.dish_cost.use_manual_price)
            .bind(commit.dish_cost.manual_price)
            .bind(commit.dish_cost.updated_at)
            .bind(commit.dish_cost.id)
            .execute(&mut *tx)
            .await?;
            if rows.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!(
                    "Dish cost {} not found",
                    commit.dish_cost.id
                )));
            }

            let rows = sqlx::query("UPDATE food_item SET cost = ?1, price = ?2 WHERE id = ?3")
                .bind(commit.food_item_cost)
                .bind(commit.food_item_price)
                .bind(commit.dish_cost.food_item_id)
                .execute(&mut *tx)
                .await?;
            if rows.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!(
                    "Food item {} not found",
                    commit.dish_cost.food_item_id
                )));
            }

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    // ── Inventory ledger ────────────────────────────────────────────

    async fn append_transaction(&self, entry: InventoryTransaction) -> StoreResult<()> {
        self.guard("append_transaction", async {
            sqlx::query(
                "INSERT INTO inventory_transaction \
                 (id, ingredient_id, transaction_type, quantity, previous_quantity, new_quantity, \
                  unit, notes, reference_id, reference_type, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(entry.id)
            .bind(entry.ingredient_id)
            .bind(entry.transaction_type)
            .bind(entry.quantity)
            .bind(entry.previous_quantity)
            .bind(entry.new_quantity)
            .bind(&entry.unit)
            .bind(&entry.notes)
            .bind(entry.reference_id)
            .bind(&entry.reference_type)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn transactions_for_ingredient(
        &self,
        ingredient_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<InventoryTransaction>> {
        self.guard("transactions_for_ingredient", async {
            let rows = sqlx::query_as::<_, InventoryTransaction>(
                "SELECT id, ingredient_id, transaction_type, quantity, previous_quantity, \
                 new_quantity, unit, notes, reference_id, reference_type, created_at \
                 FROM inventory_transaction WHERE ingredient_id = ? \
                 ORDER BY created_at DESC, id DESC LIMIT ?",
            )
            .bind(ingredient_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        })
        .await
    }
}
