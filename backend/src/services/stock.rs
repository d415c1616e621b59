//! Stock service: balances, manual adjustments, transfers and reports

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    LowStockEntry, MovementReason, PaginatedResponse, Pagination, PaginationMeta, Product,
    ProductType, StockLevels, StockLocation, StockMovement,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{
    minimum_column, AppliedDelta, MovementRow, StockChange, StockLedger, MOVEMENT_COLUMNS,
};
use crate::services::store::PgStore;

/// Row for the products table
#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    unit: String,
    product_type: String,
    cost_price: Decimal,
    sale_price: Option<Decimal>,
    is_active: bool,
    stock_counter: Decimal,
    stock_local_production: Decimal,
    stock_warehouse: Decimal,
    stock_consumables: Decimal,
    min_counter: Decimal,
    min_local_production: Decimal,
    min_warehouse: Decimal,
    min_consumables: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let product_type = ProductType::parse(&row.product_type)
            .ok_or_else(|| AppError::Internal(format!("Unknown product type '{}'", row.product_type)))?;

        Ok(Product {
            id: row.id,
            name: row.name,
            unit: row.unit,
            product_type,
            cost_price: row.cost_price,
            sale_price: row.sale_price,
            is_active: row.is_active,
            stock: StockLevels {
                counter: row.stock_counter,
                local_production: row.stock_local_production,
                warehouse: row.stock_warehouse,
                consumables: row.stock_consumables,
            },
            minimum_stock: StockLevels {
                counter: row.min_counter,
                local_production: row.min_local_production,
                warehouse: row.min_warehouse,
                consumables: row.min_consumables,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, unit, product_type, cost_price, sale_price, is_active, \
     stock_counter, stock_local_production, stock_warehouse, stock_consumables, \
     min_counter, min_local_production, min_warehouse, min_consumables, created_at, updated_at";

/// Stock service for balance queries and operator-initiated movements
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// Input for a manual adjustment (purchase, correction, spoilage, initial stock)
#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub product_id: Uuid,
    pub location: StockLocation,
    /// Signed quantity
    pub delta: Decimal,
    pub reason: MovementReason,
}

/// Input for moving stock of one product between two locations
#[derive(Debug, Deserialize)]
pub struct TransferStockInput {
    pub product_id: Uuid,
    pub from: StockLocation,
    pub to: StockLocation,
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SetMinimumInput {
    pub product_id: Uuid,
    pub location: StockLocation,
    pub minimum: Decimal,
}

/// Both legs of a completed transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub outgoing: AppliedDelta,
    pub incoming: AppliedDelta,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a product with its balances and minimums at every location
    pub async fn get_stock(&self, product_id: Uuid) -> AppResult<Product> {
        let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?
            .try_into()
    }

    /// Apply a manual adjustment and record its movement
    pub async fn adjust(&self, actor: &str, input: AdjustStockInput) -> AppResult<AppliedDelta> {
        shared::validate_adjustment(input.delta, input.reason)
            .map_err(|msg| AppError::validation("delta", msg))?;

        let mut tx = self.db.begin().await?;

        let applied = {
            let mut store = PgStore::new(&mut tx);
            store
                .apply_delta(StockChange {
                    product_id: input.product_id,
                    location: input.location,
                    delta: input.delta,
                    reason: input.reason,
                    actor: actor.to_string(),
                    order_id: None,
                })
                .await
        };
        let applied = match applied {
            Ok(applied) => applied,
            Err(err) => {
                tx.rollback().await?;
                return Err(err);
            }
        };

        tx.commit().await?;

        tracing::info!(
            product_id = %input.product_id,
            location = input.location.as_str(),
            delta = %input.delta,
            reason = input.reason.as_str(),
            actor = actor,
            "Stock adjusted"
        );

        Ok(applied)
    }

    /// Move stock between two locations as a pair of movements
    pub async fn transfer(&self, actor: &str, input: TransferStockInput) -> AppResult<TransferResult> {
        shared::validate_transfer(input.from, input.to, input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;

        let mut tx = self.db.begin().await?;

        let result = async {
            let mut store = PgStore::new(&mut tx);
            let outgoing = store
                .apply_delta(StockChange {
                    product_id: input.product_id,
                    location: input.from,
                    delta: -input.quantity,
                    reason: MovementReason::TransferOut,
                    actor: actor.to_string(),
                    order_id: None,
                })
                .await?;
            let incoming = store
                .apply_delta(StockChange {
                    product_id: input.product_id,
                    location: input.to,
                    delta: input.quantity,
                    reason: MovementReason::TransferIn,
                    actor: actor.to_string(),
                    order_id: None,
                })
                .await?;
            Ok::<_, AppError>(TransferResult { outgoing, incoming })
        }
        .await;

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                tx.rollback().await?;
                return Err(err);
            }
        };

        tx.commit().await?;

        tracing::info!(
            product_id = %input.product_id,
            from = input.from.as_str(),
            to = input.to.as_str(),
            quantity = %input.quantity,
            actor = actor,
            "Stock transferred"
        );

        Ok(result)
    }

    /// Movement history of a product, newest first
    pub async fn list_movements(
        &self,
        product_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<StockMovement>> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(&self.db)
            .await?;

        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stock_movements WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        let sql = format!(
            "SELECT {} FROM stock_movements WHERE product_id = $1 ORDER BY seq DESC LIMIT $2 OFFSET $3",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(product_id)
            .bind(i64::from(pagination.limit()))
            .bind(pagination.offset() as i64)
            .fetch_all(&self.db)
            .await?;

        let data = rows
            .into_iter()
            .map(StockMovement::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    /// Every active product and location sitting below its minimum
    pub async fn low_stock_report(&self) -> AppResult<Vec<LowStockEntry>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM products
            WHERE is_active
              AND (stock_counter < min_counter
                OR stock_local_production < min_local_production
                OR stock_warehouse < min_warehouse
                OR stock_consumables < min_consumables)
            ORDER BY name
            "#,
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.db)
            .await?;

        let mut report = Vec::new();
        for row in rows {
            let product = Product::try_from(row)?;
            report.extend(product.low_stock_locations());
        }

        Ok(report)
    }

    /// Set the minimum threshold of a product at one location
    pub async fn set_minimum(&self, input: SetMinimumInput) -> AppResult<Product> {
        shared::validate_minimum_stock(input.minimum)
            .map_err(|msg| AppError::validation("minimum", msg))?;

        let sql = format!(
            "UPDATE products SET {} = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            minimum_column(input.location),
            PRODUCT_COLUMNS
        );
        let product: Product = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(input.minimum)
            .bind(input.product_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?
            .try_into()?;

        tracing::info!(
            product_id = %input.product_id,
            location = input.location.as_str(),
            minimum = %input.minimum,
            "Minimum stock updated"
        );

        Ok(product)
    }
}
