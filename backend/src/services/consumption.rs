//! Consumption engine: the physical stock effects of producing an order
//!
//! Both operations run on the caller's transaction. They lock and validate
//! every balance they are about to debit before writing anything, so a
//! shortfall is reported in full and leaves no partial movements behind; any
//! later failure is undone by the caller rolling the transaction back.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{MovementReason, Order, Requirement, Shortfall, StockLocation, StockMovement};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::availability::AvailabilityChecker;
use crate::services::ledger::{StockChange, StockLedger};
use crate::services::recipe::RecipeResolver;

/// Where finished goods are credited
pub const FINISHED_GOODS_LOCATION: StockLocation = StockLocation::Counter;

/// Movements written for one order
#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionReceipt {
    pub order_id: Uuid,
    pub movements: Vec<StockMovement>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumptionEngine {
    checker: AvailabilityChecker,
}

impl ConsumptionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debit every ingredient of the order and credit its finished goods.
    pub async fn finalize<S>(&self, store: &mut S, order: &Order, actor: &str) -> AppResult<ConsumptionReceipt>
    where
        S: StockLedger + RecipeResolver,
    {
        let requirements = self.checker.requirements(store, &order.lines).await?;

        // Ingredient and finished-goods rows share one sorted lock pass
        let mut to_lock: BTreeMap<(Uuid, StockLocation), Option<&Requirement>> = requirements
            .ingredients()
            .map(|r| ((r.product_id, r.location), Some(r)))
            .collect();
        for (product_id, _) in requirements.production() {
            to_lock
                .entry((product_id, FINISHED_GOODS_LOCATION))
                .or_insert(None);
        }

        let mut shortfalls = Vec::new();
        for (&(product_id, location), requirement) in &to_lock {
            let available = store.balance_for_update(product_id, location).await?;
            let Some(requirement) = requirement else {
                continue;
            };
            if available < requirement.quantity {
                shortfalls.push(Shortfall {
                    product_id,
                    product_name: Some(requirement.product_name.clone()),
                    location,
                    needed: requirement.quantity,
                    available,
                });
            }
        }

        if !shortfalls.is_empty() {
            tracing::warn!(
                order_id = %order.id,
                shortfalls = shortfalls.len(),
                "Order cannot be produced, stock insufficient"
            );
            return Err(AppError::InsufficientStock { shortfalls });
        }

        let mut movements = Vec::new();

        for requirement in requirements.ingredients() {
            let applied = store
                .apply_delta(StockChange {
                    product_id: requirement.product_id,
                    location: requirement.location,
                    delta: -requirement.quantity,
                    reason: MovementReason::OrderConsumption,
                    actor: actor.to_string(),
                    order_id: Some(order.id),
                })
                .await?;
            movements.push(applied.movement);
        }

        for (product_id, quantity) in requirements.production() {
            let applied = store
                .apply_delta(StockChange {
                    product_id,
                    location: FINISHED_GOODS_LOCATION,
                    delta: quantity,
                    reason: MovementReason::OrderProduction,
                    actor: actor.to_string(),
                    order_id: Some(order.id),
                })
                .await?;
            movements.push(applied.movement);
        }

        tracing::info!(
            order_id = %order.id,
            movements = movements.len(),
            actor = actor,
            "Order stock consumed"
        );

        Ok(ConsumptionReceipt {
            order_id: order.id,
            movements,
        })
    }

    /// Undo the consumption recorded for an order.
    ///
    /// Works from the ledger rather than the current recipe, so edits made to
    /// a recipe after production do not change what is given back. Fails with
    /// `InsufficientStock` when the produced goods are no longer in stock.
    pub async fn reverse<S>(&self, store: &mut S, order: &Order, actor: &str) -> AppResult<ConsumptionReceipt>
    where
        S: StockLedger,
    {
        let recorded = store.movements_for_order(order.id).await?;

        let mut net: BTreeMap<(Uuid, StockLocation), Decimal> = BTreeMap::new();
        for movement in recorded.iter().filter(|m| m.reason.is_order_effect()) {
            *net.entry((movement.product_id, movement.location)).or_default() += movement.delta;
        }
        net.retain(|_, delta| !delta.is_zero());

        let mut shortfalls = Vec::new();
        for (&(product_id, location), &delta) in &net {
            let available = store.balance_for_update(product_id, location).await?;
            if delta > Decimal::ZERO && available < delta {
                shortfalls.push(Shortfall {
                    product_id,
                    product_name: None,
                    location,
                    needed: delta,
                    available,
                });
            }
        }

        if !shortfalls.is_empty() {
            tracing::warn!(
                order_id = %order.id,
                shortfalls = shortfalls.len(),
                "Produced goods no longer in stock, cannot reverse order"
            );
            return Err(AppError::InsufficientStock { shortfalls });
        }

        let mut movements = Vec::new();
        for ((product_id, location), delta) in net {
            let applied = store
                .apply_delta(StockChange {
                    product_id,
                    location,
                    delta: -delta,
                    reason: MovementReason::OrderCancellation,
                    actor: actor.to_string(),
                    order_id: Some(order.id),
                })
                .await?;
            movements.push(applied.movement);
        }

        tracing::info!(
            order_id = %order.id,
            movements = movements.len(),
            actor = actor,
            "Order stock reversed"
        );

        Ok(ConsumptionReceipt {
            order_id: order.id,
            movements,
        })
    }
}
