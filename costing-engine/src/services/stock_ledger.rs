//! Stock Ledger
//!
//! Applies stock movements through the store's atomic delta and appends an
//! immutable transaction record for each one. The quantity update is
//! authoritative; the log append is best-effort — a failed append is
//! reported in the result (`logged: false`) but does not fail the movement.

use crate::db::{CostingStore, StockMovement, StoreError};
use crate::notify::Notifier;
use crate::utils::validation::{
    MAX_NOTE_LEN, MAX_QUANTITY, require_finite, validate_non_negative, validate_optional_text,
    validate_quantity,
};
use crate::utils::{CostingError, CostingResult};
use shared::models::{InventoryTransaction, TransactionType};
use shared::util::{now_millis, snowflake_id};
use std::sync::Arc;

/// Reference type recorded on consumption movements
const REF_FOOD_ITEM: &str = "food_item";

/// Outcome of a ledger operation
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub movement: StockMovement,
    pub transaction_type: TransactionType,
    /// False when the quantity update succeeded but the log append failed
    pub logged: bool,
}

#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn CostingStore>,
    notifier: Arc<dyn Notifier>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn CostingStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Apply a signed stock delta and log it.
    ///
    /// Fails with [`CostingError::NegativeStock`] (state unchanged) when the
    /// result would be negative. No notification here — the typed wrappers
    /// below notify for operator-driven movements.
    pub async fn adjust(
        &self,
        ingredient_id: i64,
        delta: f64,
        transaction_type: TransactionType,
        notes: Option<String>,
        reference: Option<(i64, &str)>,
    ) -> CostingResult<StockAdjustment> {
        require_finite(delta, "delta")?;
        if delta == 0.0 {
            return Err(CostingError::validation("delta must be non-zero"));
        }
        if delta.abs() > MAX_QUANTITY {
            return Err(CostingError::validation(format!(
                "delta exceeds maximum allowed ({MAX_QUANTITY}), got {delta}"
            )));
        }
        validate_optional_text(&notes, "notes", MAX_NOTE_LEN)?;

        let movement = self
            .store
            .apply_stock_delta(ingredient_id, delta)
            .await
            .map_err(|e| map_stock_error(e, delta))?;

        let logged = self
            .log_movement(&movement, delta, transaction_type, notes, reference)
            .await;

        Ok(StockAdjustment {
            movement,
            transaction_type,
            logged,
        })
    }

    /// Stock received from a supplier
    pub async fn purchase(
        &self,
        ingredient_id: i64,
        quantity: f64,
        notes: Option<String>,
    ) -> CostingResult<StockAdjustment> {
        validate_quantity(quantity, "quantity")?;
        let result = self
            .adjust(ingredient_id, quantity, TransactionType::Purchase, notes, None)
            .await;
        self.notify_outcome(&result, ingredient_id, "Stock purchase");
        result
    }

    /// Spoilage / breakage write-off
    pub async fn waste(
        &self,
        ingredient_id: i64,
        quantity: f64,
        notes: Option<String>,
    ) -> CostingResult<StockAdjustment> {
        validate_quantity(quantity, "quantity")?;
        let result = self
            .adjust(ingredient_id, -quantity, TransactionType::Waste, notes, None)
            .await;
        self.notify_outcome(&result, ingredient_id, "Stock write-off");
        result
    }

    /// Order-driven consumption; silent — the deductor aggregates feedback
    pub async fn consume(
        &self,
        ingredient_id: i64,
        quantity: f64,
        food_item_id: i64,
    ) -> CostingResult<StockAdjustment> {
        validate_quantity(quantity, "quantity")?;
        self.adjust(
            ingredient_id,
            -quantity,
            TransactionType::Consumption,
            None,
            Some((food_item_id, REF_FOOD_ITEM)),
        )
        .await
    }

    /// Stock take: set the absolute level, logging the difference as an
    /// adjustment
    pub async fn set_level(
        &self,
        ingredient_id: i64,
        level: f64,
        notes: Option<String>,
    ) -> CostingResult<StockAdjustment> {
        validate_non_negative(level, "level", MAX_QUANTITY)?;
        validate_optional_text(&notes, "notes", MAX_NOTE_LEN)?;

        let result = async {
            let movement = self
                .store
                .set_stock_level(ingredient_id, level)
                .await
                .map_err(|e| map_stock_error(e, level))?;
            let delta = movement.new_quantity - movement.previous_quantity;
            let logged = self
                .log_movement(&movement, delta, TransactionType::Adjustment, notes, None)
                .await;
            Ok(StockAdjustment {
                movement,
                transaction_type: TransactionType::Adjustment,
                logged,
            })
        }
        .await;
        self.notify_outcome(&result, ingredient_id, "Stock take");
        result
    }

    /// Newest-first movement history for an ingredient
    pub async fn history(
        &self,
        ingredient_id: i64,
        limit: i64,
    ) -> CostingResult<Vec<InventoryTransaction>> {
        Ok(self
            .store
            .transactions_for_ingredient(ingredient_id, limit)
            .await?)
    }

    /// Append the transaction record. The quantity update already
    /// committed, so a log failure is logged and flagged but never
    /// propagated.
    async fn log_movement(
        &self,
        movement: &StockMovement,
        delta: f64,
        transaction_type: TransactionType,
        notes: Option<String>,
        reference: Option<(i64, &str)>,
    ) -> bool {
        let entry = InventoryTransaction {
            id: snowflake_id(),
            ingredient_id: movement.ingredient_id,
            transaction_type,
            quantity: delta,
            previous_quantity: movement.previous_quantity,
            new_quantity: movement.new_quantity,
            unit: movement.unit.clone(),
            notes,
            reference_id: reference.map(|(id, _)| id),
            reference_type: reference.map(|(_, kind)| kind.to_string()),
            created_at: now_millis(),
        };
        match self.store.append_transaction(entry).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    ingredient_id = movement.ingredient_id,
                    error = %e,
                    "stock movement applied but transaction log append failed"
                );
                false
            }
        }
    }

    fn notify_outcome(
        &self,
        result: &CostingResult<StockAdjustment>,
        ingredient_id: i64,
        operation: &str,
    ) {
        match result {
            Ok(adjustment) => self.notifier.notify_success(&format!(
                "{operation} recorded: ingredient {ingredient_id} now at {} {}",
                adjustment.movement.new_quantity, adjustment.movement.unit
            )),
            Err(e) => self
                .notifier
                .notify_error(&format!("{operation} failed for ingredient {ingredient_id}: {e}")),
        }
    }
}

/// InsufficientStock / NotFound from the store → service taxonomy
fn map_stock_error(err: StoreError, requested: f64) -> CostingError {
    match err {
        StoreError::InsufficientStock {
            ingredient_id,
            available,
        } => CostingError::NegativeStock {
            ingredient_id,
            requested: requested.abs(),
            available,
        },
        StoreError::NotFound(msg) => CostingError::NotFound(msg),
        other => CostingError::Persistence(other),
    }
}
