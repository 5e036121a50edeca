//! Domain services
//!
//! Leaves first: the catalog and the pure cost calculator, then the ledger,
//! then the two orchestrating services (propagator, deductor).

pub mod catalog;
pub mod deduction;
pub mod dish_cost;
pub mod recipe_cost;
pub mod stock_ledger;

// Re-exports
pub use catalog::IngredientCatalog;
pub use deduction::{DeductionFailure, DeductionLine, DeductionReport, OrderDeductor};
pub use dish_cost::{
    DishCostBreakdown, DishCostService, DishPricingPatch, IngredientRefreshReport,
    RecipeSaveInput, RecipeSaveSummary,
};
pub use recipe_cost::{CostedLine, RecipeCostBreakdown, RecipeLineInput, compute_recipe_cost};
pub use stock_ledger::{StockAdjustment, StockLedger};

use crate::core::{Config, DeductionPolicy};
use crate::db::{CostingStore, DbService, SqliteStore, StoreError};
use crate::notify::Notifier;
use std::sync::Arc;

/// The engine's services wired over one store/notifier pair
///
/// The surrounding application constructs this once and calls into the
/// fields; tests usually wire [`crate::db::MemoryStore`] instead.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn CostingStore>,
    pub catalog: IngredientCatalog,
    pub dishes: DishCostService,
    pub ledger: StockLedger,
    pub deductor: OrderDeductor,
}

impl Services {
    pub fn new(
        store: Arc<dyn CostingStore>,
        notifier: Arc<dyn Notifier>,
        policy: DeductionPolicy,
    ) -> Self {
        Self {
            catalog: IngredientCatalog::new(store.clone()),
            dishes: DishCostService::new(store.clone(), notifier.clone()),
            ledger: StockLedger::new(store.clone(), notifier.clone()),
            deductor: OrderDeductor::new(store.clone(), notifier, policy),
            store,
        }
    }

    /// Open the SQLite store described by the config and wire everything up
    pub async fn open_sqlite(
        config: &Config,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, StoreError> {
        let db = DbService::new(&config.database_path).await?;
        let store = Arc::new(SqliteStore::with_timeout(db.pool, config.storage_timeout_ms));
        Ok(Self::new(store, notifier, config.deduction_policy))
    }
}
