//! Inventory Transaction Model

use serde::{Deserialize, Serialize};

/// Kind of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Stock received from a supplier
    Purchase,
    /// Manual correction / stock take
    Adjustment,
    /// Spoilage, breakage
    Waste,
    /// Deducted by an order
    Consumption,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Adjustment => "adjustment",
            TransactionType::Waste => "waste",
            TransactionType::Consumption => "consumption",
        }
    }
}

/// Append-only record of a single stock movement
///
/// Never mutated or deleted; `previous_quantity`/`new_quantity` capture the
/// state around the movement so the log replays without the ingredient row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct InventoryTransaction {
    pub id: i64,
    pub ingredient_id: i64,
    pub transaction_type: TransactionType,
    /// Signed delta applied to the stock level
    pub quantity: f64,
    pub previous_quantity: f64,
    pub new_quantity: f64,
    pub unit: String,
    pub notes: Option<String>,
    /// Originating record, e.g. the food item of a consumption
    pub reference_id: Option<i64>,
    pub reference_type: Option<String>,
    /// UTC millis
    pub created_at: i64,
}
