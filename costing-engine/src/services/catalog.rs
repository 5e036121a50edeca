//! Ingredient Catalog service
//!
//! Catalog edits cover the descriptive fields and unit cost; stock levels
//! are owned by the stock ledger. An ingredient referenced by any recipe
//! line cannot be removed.

use crate::db::{CostingStore, StoreError};
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_UNIT_COST, MAX_UNIT_LEN, validate_non_negative, validate_required_text,
};
use crate::utils::{CostingError, CostingResult};
use shared::models::{Ingredient, IngredientCreate, IngredientUpdate};
use shared::util::snowflake_id;
use std::sync::Arc;

#[derive(Clone)]
pub struct IngredientCatalog {
    store: Arc<dyn CostingStore>,
}

impl IngredientCatalog {
    pub fn new(store: Arc<dyn CostingStore>) -> Self {
        Self { store }
    }

    /// Create a new catalog entry with an optional opening stock level
    pub async fn create(&self, data: IngredientCreate) -> CostingResult<Ingredient> {
        validate_required_text(&data.name, "name", MAX_NAME_LEN)?;
        validate_required_text(&data.unit, "unit", MAX_UNIT_LEN)?;
        validate_non_negative(data.unit_cost, "unit_cost", MAX_UNIT_COST)?;
        let stock_quantity = data.stock_quantity.unwrap_or(0.0);
        validate_non_negative(stock_quantity, "stock_quantity", f64::MAX)?;
        let reorder_level = data.reorder_level.unwrap_or(0.0);
        validate_non_negative(reorder_level, "reorder_level", f64::MAX)?;

        let ingredient = Ingredient {
            id: snowflake_id(),
            name: data.name,
            unit: data.unit,
            unit_cost: data.unit_cost,
            stock_quantity,
            reorder_level,
            is_active: true,
        };
        self.store.insert_ingredient(ingredient.clone()).await?;
        tracing::info!(id = ingredient.id, name = %ingredient.name, "ingredient created");
        Ok(ingredient)
    }

    /// Update descriptive fields / unit cost. Stock is not editable here.
    ///
    /// A unit-cost change does not touch existing dish costs; call
    /// `DishCostService::refresh_for_ingredient` afterwards to re-cost the
    /// recipes using it.
    pub async fn update(&self, id: i64, patch: IngredientUpdate) -> CostingResult<Ingredient> {
        if let Some(ref name) = patch.name {
            validate_required_text(name, "name", MAX_NAME_LEN)?;
        }
        if let Some(ref unit) = patch.unit {
            validate_required_text(unit, "unit", MAX_UNIT_LEN)?;
        }
        if let Some(unit_cost) = patch.unit_cost {
            validate_non_negative(unit_cost, "unit_cost", MAX_UNIT_COST)?;
        }
        if let Some(reorder_level) = patch.reorder_level {
            validate_non_negative(reorder_level, "reorder_level", f64::MAX)?;
        }

        let updated = self.store.update_ingredient(id, patch).await.map_err(map_not_found)?;
        Ok(updated)
    }

    pub async fn get(&self, id: i64) -> CostingResult<Ingredient> {
        self.store
            .ingredient(id)
            .await?
            .ok_or_else(|| CostingError::not_found(format!("Ingredient {id}")))
    }

    /// Batched lookup; unknown ids are simply absent from the result
    pub async fn resolve(&self, ids: &[i64]) -> CostingResult<Vec<Ingredient>> {
        Ok(self.store.ingredients_by_ids(ids).await?)
    }

    pub async fn list(&self) -> CostingResult<Vec<Ingredient>> {
        Ok(self.store.all_ingredients().await?)
    }

    /// Reorder report: active ingredients at or below their reorder level
    pub async fn low_stock(&self) -> CostingResult<Vec<Ingredient>> {
        Ok(self.store.ingredients_below_reorder().await?)
    }

    /// Remove an ingredient. Refused while any recipe line references it.
    pub async fn remove(&self, id: i64) -> CostingResult<()> {
        let referencing = self.store.recipes_using_ingredient(id).await?;
        if !referencing.is_empty() {
            return Err(CostingError::validation(format!(
                "Cannot remove ingredient {id}: referenced by {} recipe(s)",
                referencing.len()
            )));
        }
        self.store.delete_ingredient(id).await.map_err(map_not_found)?;
        tracing::info!(id, "ingredient removed");
        Ok(())
    }
}

/// Store-level NotFound → service-level NotFound (everything else stays a
/// persistence failure)
fn map_not_found(err: StoreError) -> CostingError {
    match err {
        StoreError::NotFound(msg) => CostingError::NotFound(msg),
        other => CostingError::Persistence(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn catalog() -> (IngredientCatalog, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (IngredientCatalog::new(store.clone()), store)
    }

    fn flour() -> IngredientCreate {
        IngredientCreate {
            name: "Flour".to_string(),
            unit: "kg".to_string(),
            unit_cost: 2.0,
            stock_quantity: Some(10.0),
            reorder_level: Some(2.0),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (catalog, _) = catalog();
        let created = catalog.create(flour()).await.unwrap();
        let fetched = catalog.get(created.id).await.unwrap();
        assert_eq!(fetched.name, "Flour");
        assert_eq!(fetched.stock_quantity, 10.0);
    }

    #[tokio::test]
    async fn test_create_rejects_negative_cost() {
        let (catalog, _) = catalog();
        let mut data = flour();
        data.unit_cost = -1.0;
        assert!(matches!(
            catalog.create(data).await,
            Err(CostingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_low_stock_report() {
        let (catalog, _) = catalog();
        let a = catalog.create(flour()).await.unwrap();
        let mut scarce = flour();
        scarce.name = "Saffron".to_string();
        scarce.stock_quantity = Some(1.0);
        scarce.reorder_level = Some(5.0);
        let b = catalog.create(scarce).await.unwrap();

        let low = catalog.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, b.id);
        assert_ne!(low[0].id, a.id);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (catalog, _) = catalog();
        assert!(matches!(
            catalog.get(42).await,
            Err(CostingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_skips_unknown_ids() {
        let (catalog, _) = catalog();
        let a = catalog.create(flour()).await.unwrap();

        let resolved = catalog.resolve(&[a.id, 999]).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, a.id);
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }
}
