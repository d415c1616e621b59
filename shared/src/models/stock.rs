//! Stock locations, balances and the movement ledger record

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// A named stock pool tracked independently per product
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLocation {
    /// Shop counter, where finished goods are sold
    Counter,
    LocalProduction,
    /// Ingredient warehouse
    Warehouse,
    Consumables,
}

impl StockLocation {
    pub const ALL: [StockLocation; 4] = [
        StockLocation::Counter,
        StockLocation::LocalProduction,
        StockLocation::Warehouse,
        StockLocation::Consumables,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockLocation::Counter => "counter",
            StockLocation::LocalProduction => "local_production",
            StockLocation::Warehouse => "warehouse",
            StockLocation::Consumables => "consumables",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "counter" => Some(StockLocation::Counter),
            "local_production" => Some(StockLocation::LocalProduction),
            "warehouse" => Some(StockLocation::Warehouse),
            "consumables" => Some(StockLocation::Consumables),
            _ => None,
        }
    }
}

impl fmt::Display for StockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockLocation::Counter => write!(f, "Counter"),
            StockLocation::LocalProduction => write!(f, "Local production"),
            StockLocation::Warehouse => write!(f, "Warehouse"),
            StockLocation::Consumables => write!(f, "Consumables"),
        }
    }
}

/// One quantity per location. Used for balances and for minimum thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub counter: Decimal,
    pub local_production: Decimal,
    pub warehouse: Decimal,
    pub consumables: Decimal,
}

impl StockLevels {
    pub fn get(&self, location: StockLocation) -> Decimal {
        match location {
            StockLocation::Counter => self.counter,
            StockLocation::LocalProduction => self.local_production,
            StockLocation::Warehouse => self.warehouse,
            StockLocation::Consumables => self.consumables,
        }
    }

    pub fn get_mut(&mut self, location: StockLocation) -> &mut Decimal {
        match location {
            StockLocation::Counter => &mut self.counter,
            StockLocation::LocalProduction => &mut self.local_production,
            StockLocation::Warehouse => &mut self.warehouse,
            StockLocation::Consumables => &mut self.consumables,
        }
    }

    /// Sum across all locations
    pub fn total(&self) -> Decimal {
        StockLocation::ALL.iter().map(|l| self.get(*l)).sum()
    }
}

/// Why a balance changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    InitialStock,
    Purchase,
    Correction,
    Spoilage,
    TransferOut,
    TransferIn,
    /// Ingredient debited when an order is produced
    OrderConsumption,
    /// Finished goods credited when an order is produced
    OrderProduction,
    /// Compensation of consumption/production when a produced order is cancelled
    OrderCancellation,
}

impl MovementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::InitialStock => "initial_stock",
            MovementReason::Purchase => "purchase",
            MovementReason::Correction => "correction",
            MovementReason::Spoilage => "spoilage",
            MovementReason::TransferOut => "transfer_out",
            MovementReason::TransferIn => "transfer_in",
            MovementReason::OrderConsumption => "order_consumption",
            MovementReason::OrderProduction => "order_production",
            MovementReason::OrderCancellation => "order_cancellation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initial_stock" => Some(MovementReason::InitialStock),
            "purchase" => Some(MovementReason::Purchase),
            "correction" => Some(MovementReason::Correction),
            "spoilage" => Some(MovementReason::Spoilage),
            "transfer_out" => Some(MovementReason::TransferOut),
            "transfer_in" => Some(MovementReason::TransferIn),
            "order_consumption" => Some(MovementReason::OrderConsumption),
            "order_production" => Some(MovementReason::OrderProduction),
            "order_cancellation" => Some(MovementReason::OrderCancellation),
            _ => None,
        }
    }

    /// Reasons produced by finalizing an order, i.e. the ones a cancellation undoes
    pub fn is_order_effect(&self) -> bool {
        matches!(
            self,
            MovementReason::OrderConsumption | MovementReason::OrderProduction
        )
    }

    /// Reasons an operator may record by hand
    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            MovementReason::InitialStock
                | MovementReason::Purchase
                | MovementReason::Correction
                | MovementReason::Spoilage
        )
    }
}

/// Immutable audit record of one balance change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub location: StockLocation,
    pub delta: Decimal,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub order_id: Option<Uuid>,
    pub reason: MovementReason,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

/// Apply `delta` to `balance`, refusing zero deltas and negative results.
///
/// Returns the new balance. This is the single rule every ledger
/// implementation applies before writing.
pub fn checked_balance(
    product_id: Uuid,
    location: StockLocation,
    balance: Decimal,
    delta: Decimal,
) -> DomainResult<Decimal> {
    if delta.is_zero() {
        return Err(DomainError::InvalidQuantity(
            "Stock change must be non-zero".to_string(),
        ));
    }

    let after = balance.checked_add(delta).ok_or_else(|| {
        DomainError::InvalidQuantity(format!(
            "Stock change {} overflows the balance of product {}",
            delta, product_id
        ))
    })?;
    if after < Decimal::ZERO {
        return Err(DomainError::InsufficientStock {
            product_id,
            location,
            requested: -delta,
            available: balance,
        });
    }
    Ok(after)
}
