//! Storage port
//!
//! 可插拔的持久化抽象：
//! ```text
//!         ┌─────────────────────┐
//!         │  CostingStore Trait │  ◄── 可插拔接口
//!         └─────────┬───────────┘
//!                   │
//!          ┌────────┴────────┐
//!          ▼                 ▼
//!     SqliteStore       MemoryStore
//!     (sqlx/SQLite)     (进程内，测试用)
//! ```
//!
//! Stock deltas and the two multi-table commits are *atomic at the store* —
//! the engine never does read-modify-write on stock and never leaves a
//! recipe save half-applied.

use async_trait::async_trait;
use shared::models::{
    DishCost, DishIngredient, FoodItem, Ingredient, IngredientUpdate, InventoryTransaction,
    Recipe, RecipeIngredient,
};
use thiserror::Error;

/// Tolerance when checking the non-negative stock guard (float noise from
/// REAL columns; anything this close to zero counts as zero).
pub(crate) const STOCK_EPSILON: f64 = 1e-9;

/// Storage error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Deadline miss on a storage call; retrying may succeed
    #[error("Storage call timed out: {op} after {timeout_ms}ms")]
    Timeout { op: &'static str, timeout_ms: u64 },

    /// The conditional stock update rejected the delta
    #[error("Insufficient stock for ingredient {ingredient_id}: available {available}")]
    InsufficientStock { ingredient_id: i64, available: f64 },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl StoreError {
    /// Whether the same call may succeed on a retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an atomic stock mutation
#[derive(Debug, Clone)]
pub struct StockMovement {
    pub ingredient_id: i64,
    pub unit: String,
    pub previous_quantity: f64,
    pub new_quantity: f64,
}

/// Everything a recipe save writes, committed in one transaction
///
/// The propagator computes the full target state (ids already assigned);
/// the store applies it atomically: upsert recipe, replace lines, upsert
/// dish cost, replace the dish-ingredient mirror, push cost/price onto the
/// food item.
#[derive(Debug, Clone)]
pub struct RecipeSaveBatch {
    pub recipe: Recipe,
    pub recipe_is_new: bool,
    pub lines: Vec<RecipeIngredient>,
    pub dish_cost: DishCost,
    pub dish_is_new: bool,
    pub dish_lines: Vec<DishIngredient>,
    pub food_item_cost: f64,
    pub food_item_price: f64,
}

/// A pricing-only change (overhead/margin/manual price), committed in one
/// transaction together with the food-item push
#[derive(Debug, Clone)]
pub struct DishPricingCommit {
    pub dish_cost: DishCost,
    pub food_item_cost: f64,
    pub food_item_price: f64,
}

/// Persistence port for the costing engine
///
/// Implementations must be safe to share across tasks; the engine holds an
/// `Arc<dyn CostingStore>`.
#[async_trait]
pub trait CostingStore: Send + Sync {
    // ── Ingredient catalog ──────────────────────────────────────────

    async fn ingredient(&self, id: i64) -> StoreResult<Option<Ingredient>>;

    /// Batched get-by-id-list — resolves recipe lines in one round trip
    async fn ingredients_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<Ingredient>>;

    async fn all_ingredients(&self) -> StoreResult<Vec<Ingredient>>;

    /// Active ingredients at or below their reorder level
    async fn ingredients_below_reorder(&self) -> StoreResult<Vec<Ingredient>>;

    async fn insert_ingredient(&self, ingredient: Ingredient) -> StoreResult<()>;

    async fn update_ingredient(&self, id: i64, patch: IngredientUpdate) -> StoreResult<Ingredient>;

    async fn delete_ingredient(&self, id: i64) -> StoreResult<()>;

    /// Atomically apply a signed stock delta with a non-negative guard.
    ///
    /// Single conditional update — no read-modify-write window. Concurrent
    /// deltas on the same ingredient serialize here; a delta whose result
    /// would be negative fails with [`StoreError::InsufficientStock`] and
    /// leaves the row unchanged.
    async fn apply_stock_delta(&self, ingredient_id: i64, delta: f64) -> StoreResult<StockMovement>;

    /// Atomically set the absolute stock level (stock take), returning the
    /// movement from the previous level.
    async fn set_stock_level(&self, ingredient_id: i64, level: f64) -> StoreResult<StockMovement>;

    // ── Recipes ─────────────────────────────────────────────────────

    async fn recipe_by_food_item(&self, food_item_id: i64) -> StoreResult<Option<Recipe>>;

    async fn recipe_ingredients(&self, recipe_id: i64) -> StoreResult<Vec<RecipeIngredient>>;

    /// Recipes with at least one line referencing the ingredient
    async fn recipes_using_ingredient(&self, ingredient_id: i64) -> StoreResult<Vec<Recipe>>;

    // ── Dish costs ──────────────────────────────────────────────────

    async fn dish_cost_by_food_item(&self, food_item_id: i64) -> StoreResult<Option<DishCost>>;

    async fn dish_ingredients(&self, dish_cost_id: i64) -> StoreResult<Vec<DishIngredient>>;

    // ── Food items ──────────────────────────────────────────────────

    async fn food_item(&self, id: i64) -> StoreResult<Option<FoodItem>>;

    async fn insert_food_item(&self, item: FoodItem) -> StoreResult<()>;

    // ── Transactional commits ───────────────────────────────────────

    /// Apply a full recipe save in one transaction; on failure the previous
    /// state stays fully intact.
    async fn commit_recipe_save(&self, batch: RecipeSaveBatch) -> StoreResult<()>;

    /// Apply a pricing update plus the food-item push in one transaction.
    async fn commit_dish_pricing(&self, commit: DishPricingCommit) -> StoreResult<()>;

    // ── Inventory ledger ────────────────────────────────────────────

    /// Append-only; no update or delete exists for the transaction log.
    async fn append_transaction(&self, entry: InventoryTransaction) -> StoreResult<()>;

    /// Newest-first movement history for an ingredient
    async fn transactions_for_ingredient(
        &self,
        ingredient_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<InventoryTransaction>>;
}
