//! Stock ledger: per-(product, location) balances plus the append-only movement log
//!
//! Balances live in one column per location on `products`; every change goes
//! through [`StockLedger::apply_delta`], which writes the balance and its
//! `stock_movements` row on the caller's transaction.

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{checked_balance, MovementReason, StockLocation, StockMovement};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::store::PgStore;

/// A requested balance change
#[derive(Debug, Clone)]
pub struct StockChange {
    pub product_id: Uuid,
    pub location: StockLocation,
    /// Signed quantity; negative debits, positive credits
    pub delta: Decimal,
    pub reason: MovementReason,
    pub actor: String,
    pub order_id: Option<Uuid>,
}

/// Outcome of a successful [`StockLedger::apply_delta`]
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppliedDelta {
    pub new_balance: Decimal,
    pub movement: StockMovement,
}

/// Authoritative stock balances and their movement history.
pub trait StockLedger: Send {
    /// Current balance; zero when the product has no stock record.
    fn get_balance(
        &mut self,
        product_id: Uuid,
        location: StockLocation,
    ) -> impl Future<Output = AppResult<Decimal>> + Send;

    /// Current balance, locking the product against concurrent writers until
    /// the enclosing transaction ends.
    fn balance_for_update(
        &mut self,
        product_id: Uuid,
        location: StockLocation,
    ) -> impl Future<Output = AppResult<Decimal>> + Send;

    /// Add `change.delta` to the balance and append exactly one movement.
    ///
    /// Fails with `InsufficientStock` (no write, no movement) when the result
    /// would be negative.
    fn apply_delta(
        &mut self,
        change: StockChange,
    ) -> impl Future<Output = AppResult<AppliedDelta>> + Send;

    /// Movements linked to an order, oldest first
    fn movements_for_order(
        &mut self,
        order_id: Uuid,
    ) -> impl Future<Output = AppResult<Vec<StockMovement>>> + Send;
}

/// Balance column for a location
pub(crate) fn stock_column(location: StockLocation) -> &'static str {
    match location {
        StockLocation::Counter => "stock_counter",
        StockLocation::LocalProduction => "stock_local_production",
        StockLocation::Warehouse => "stock_warehouse",
        StockLocation::Consumables => "stock_consumables",
    }
}

/// Minimum-threshold column for a location
pub(crate) fn minimum_column(location: StockLocation) -> &'static str {
    match location {
        StockLocation::Counter => "min_counter",
        StockLocation::LocalProduction => "min_local_production",
        StockLocation::Warehouse => "min_warehouse",
        StockLocation::Consumables => "min_consumables",
    }
}

pub(crate) const MOVEMENT_COLUMNS: &str =
    "id, product_id, location, delta, stock_before, stock_after, order_id, reason, actor, created_at";

/// Row for the stock_movements table
#[derive(Debug, FromRow)]
pub(crate) struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    location: String,
    delta: Decimal,
    stock_before: Decimal,
    stock_after: Decimal,
    order_id: Option<Uuid>,
    reason: String,
    actor: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let location = StockLocation::parse(&row.location)
            .ok_or_else(|| AppError::Internal(format!("Unknown stock location '{}'", row.location)))?;
        let reason = MovementReason::parse(&row.reason)
            .ok_or_else(|| AppError::Internal(format!("Unknown movement reason '{}'", row.reason)))?;

        Ok(StockMovement {
            id: row.id,
            product_id: row.product_id,
            location,
            delta: row.delta,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            order_id: row.order_id,
            reason,
            actor: row.actor,
            created_at: row.created_at,
        })
    }
}

impl PgStore<'_> {
    async fn select_balance(
        &mut self,
        product_id: Uuid,
        location: StockLocation,
        for_update: bool,
    ) -> AppResult<Option<Decimal>> {
        let sql = format!(
            "SELECT {} FROM products WHERE id = $1{}",
            stock_column(location),
            if for_update { " FOR UPDATE" } else { "" }
        );

        let balance = sqlx::query_scalar::<_, Decimal>(&sql)
            .bind(product_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(balance)
    }
}

impl StockLedger for PgStore<'_> {
    async fn get_balance(&mut self, product_id: Uuid, location: StockLocation) -> AppResult<Decimal> {
        Ok(self
            .select_balance(product_id, location, false)
            .await?
            .unwrap_or(Decimal::ZERO))
    }

    async fn balance_for_update(
        &mut self,
        product_id: Uuid,
        location: StockLocation,
    ) -> AppResult<Decimal> {
        Ok(self
            .select_balance(product_id, location, true)
            .await?
            .unwrap_or(Decimal::ZERO))
    }

    async fn apply_delta(&mut self, change: StockChange) -> AppResult<AppliedDelta> {
        let before = self
            .select_balance(change.product_id, change.location, true)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", change.product_id)))?;

        let after = checked_balance(change.product_id, change.location, before, change.delta)?;

        let update = format!(
            "UPDATE products SET {} = $1, updated_at = NOW() WHERE id = $2",
            stock_column(change.location)
        );
        sqlx::query(&update)
            .bind(after)
            .bind(change.product_id)
            .execute(&mut *self.conn)
            .await?;

        let insert = format!(
            r#"
            INSERT INTO stock_movements (
                product_id, location, delta, stock_before, stock_after, order_id, reason, actor
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, MovementRow>(&insert)
            .bind(change.product_id)
            .bind(change.location.as_str())
            .bind(change.delta)
            .bind(before)
            .bind(after)
            .bind(change.order_id)
            .bind(change.reason.as_str())
            .bind(&change.actor)
            .fetch_one(&mut *self.conn)
            .await?;

        tracing::debug!(
            product_id = %change.product_id,
            location = change.location.as_str(),
            delta = %change.delta,
            before = %before,
            after = %after,
            reason = change.reason.as_str(),
            "Stock movement recorded"
        );

        Ok(AppliedDelta {
            new_balance: after,
            movement: row.try_into()?,
        })
    }

    async fn movements_for_order(&mut self, order_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE order_id = $1 ORDER BY seq",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(order_id)
            .fetch_all(&mut *self.conn)
            .await?;

        rows.into_iter().map(StockMovement::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::MemoryStore;

    fn change(product_id: Uuid, delta: i64) -> StockChange {
        StockChange {
            product_id,
            location: StockLocation::Warehouse,
            delta: Decimal::from(delta),
            reason: MovementReason::Correction,
            actor: "tester".to_string(),
            order_id: None,
        }
    }

    #[test]
    fn test_location_columns_are_distinct() {
        let mut columns: Vec<_> = StockLocation::ALL
            .iter()
            .flat_map(|l| [stock_column(*l), minimum_column(*l)])
            .collect();
        columns.sort();
        columns.dedup();
        assert_eq!(columns.len(), 8);
    }

    #[tokio::test]
    async fn test_unknown_product_has_zero_balance() {
        let mut store = MemoryStore::default();
        let balance = store
            .get_balance(Uuid::new_v4(), StockLocation::Counter)
            .await
            .unwrap();
        assert_eq!(balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_apply_delta_records_one_movement() {
        let flour = Uuid::new_v4();
        let mut store = MemoryStore::default().with_stock(flour, StockLocation::Warehouse, 10);

        let applied = store.apply_delta(change(flour, -4)).await.unwrap();

        assert_eq!(applied.new_balance, Decimal::from(6));
        assert_eq!(store.movements.len(), 1);
        let m = &store.movements[0];
        assert_eq!(m.stock_after - m.stock_before, m.delta);
        assert_eq!(m.stock_before, Decimal::from(10));
    }

    #[tokio::test]
    async fn test_rejected_debit_leaves_no_trace() {
        let flour = Uuid::new_v4();
        let mut store = MemoryStore::default().with_stock(flour, StockLocation::Warehouse, 3);

        let err = store.apply_delta(change(flour, -4)).await.unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock { .. }));
        assert_eq!(store.balance(flour, StockLocation::Warehouse), Decimal::from(3));
        assert!(store.movements.is_empty());
    }
}
