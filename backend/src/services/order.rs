//! Order service: creation, availability and status transitions

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    plan_transition, AvailabilityReport, Order, OrderLine, OrderStatus, OrderType, StockMovement,
    TransitionEffect,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::availability::AvailabilityChecker;
use crate::services::consumption::{ConsumptionEngine, ConsumptionReceipt};
use crate::services::ledger::StockLedger;
use crate::services::recipe::RecipeResolver;
use crate::services::store::PgStore;

/// What a transition did to stock
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub effect: TransitionEffect,
    pub receipt: Option<ConsumptionReceipt>,
}

/// Validate `order.status -> target` and run its stock side effect.
///
/// Does not persist the new status; the caller does that on the same
/// transaction once this returns successfully.
pub async fn run_transition<S>(
    store: &mut S,
    order: &Order,
    target: OrderStatus,
    actor: &str,
) -> AppResult<TransitionOutcome>
where
    S: StockLedger + RecipeResolver,
{
    let effect = plan_transition(order.order_type, order.status, target)?;
    let engine = ConsumptionEngine::new();

    let receipt = match effect {
        TransitionEffect::RequireAvailability => {
            let report = AvailabilityChecker.check(store, &order.lines).await?;
            if !report.is_sufficient {
                return Err(AppError::InsufficientStock {
                    shortfalls: report.shortfalls,
                });
            }
            None
        }
        TransitionEffect::Consume => Some(engine.finalize(store, order, actor).await?),
        TransitionEffect::Reverse => Some(engine.reverse(store, order, actor).await?),
        TransitionEffect::CollectPayment | TransitionEffect::None => None,
    };

    Ok(TransitionOutcome { effect, receipt })
}

/// Row for the orders table
#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_type: String,
    status: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    due_date: NaiveDate,
    notes: Option<String>,
    total_amount: Decimal,
    paid_amount: Option<Decimal>,
    paid_at: Option<DateTime<Utc>>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> AppResult<Order> {
        let order_type = OrderType::parse(&self.order_type)
            .ok_or_else(|| AppError::Internal(format!("Unknown order type '{}'", self.order_type)))?;
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown order status '{}'", self.status)))?;

        Ok(Order {
            id: self.id,
            order_type,
            status,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            due_date: self.due_date,
            notes: self.notes,
            total_amount: self.total_amount,
            paid_amount: self.paid_amount,
            paid_at: self.paid_at,
            created_by: self.created_by,
            lines: items
                .into_iter()
                .map(|i| OrderLine {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_type, status, customer_name, customer_phone, due_date, notes, \
     total_amount, paid_amount, paid_at, created_by, created_at, updated_at";

/// Load an order with its lines, optionally locking the order row
async fn load_order(conn: &mut PgConnection, order_id: Uuid, for_update: bool) -> AppResult<Order> {
    let sql = format!(
        "SELECT {} FROM orders WHERE id = $1{}",
        ORDER_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    let items = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT product_id, quantity, unit_price
        FROM order_items
        WHERE order_id = $1
        ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_order(items)
}

/// Order service for customer orders and counter production requests
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

/// Input for creating an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub order_type: OrderType,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: Option<String>,
    #[validate(length(max = 50))]
    pub customer_phone: Option<String>,
    pub due_date: NaiveDate,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "Order must have at least one line"))]
    pub lines: Vec<OrderLine>,
}

/// Input for the advisory availability check
#[derive(Debug, Deserialize, Validate)]
pub struct AvailabilityInput {
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusInput {
    pub status: OrderStatus,
}

/// A freshly created order and the availability it was classified with
#[derive(Debug, Clone, Serialize)]
pub struct CreatedOrder {
    pub order: Order,
    pub availability: AvailabilityReport,
}

/// An order after a status change, with the stock movements it caused
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub order: Order,
    pub movements: Vec<StockMovement>,
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an order; it starts in production when stock already covers it
    pub async fn create_order(&self, actor: &str, input: CreateOrderInput) -> AppResult<CreatedOrder> {
        input.validate()?;
        shared::validate_order_lines(&input.lines).map_err(|msg| AppError::validation("lines", msg))?;

        if input.order_type == OrderType::CustomerOrder
            && input.customer_name.as_deref().map_or(true, |n| n.trim().is_empty())
        {
            return Err(AppError::validation(
                "customer_name",
                "Customer orders require a customer name",
            ));
        }

        let total_amount = shared::order_total(&input.lines)?;

        let mut tx = self.db.begin().await?;

        let mut product_ids: Vec<Uuid> = input.lines.iter().map(|l| l.product_id).collect();
        product_ids.sort();
        product_ids.dedup();

        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE id = ANY($1) AND is_active",
        )
        .bind(&product_ids[..])
        .fetch_one(&mut *tx)
        .await?;

        if found != product_ids.len() as i64 {
            return Err(AppError::validation(
                "lines",
                "One or more products do not exist or are inactive",
            ));
        }

        let availability = {
            let mut store = PgStore::new(&mut tx);
            AvailabilityChecker.check(&mut store, &input.lines).await
        };
        let availability = match availability {
            Ok(report) => report,
            Err(err) => {
                tx.rollback().await?;
                return Err(err);
            }
        };

        let status = OrderStatus::initial(availability.is_sufficient);

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO orders (
                order_type, status, customer_name, customer_phone, due_date, notes,
                total_amount, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(input.order_type.as_str())
        .bind(status.as_str())
        .bind(&input.customer_name)
        .bind(&input.customer_phone)
        .bind(input.due_date)
        .bind(&input.notes)
        .bind(total_amount)
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        for (position, line) in input.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        let order = load_order(&mut tx, order_id, false).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_type = order.order_type.as_str(),
            status = order.status.as_str(),
            shortfalls = availability.shortfalls.len(),
            actor = actor,
            "Order created"
        );

        Ok(CreatedOrder { order, availability })
    }

    /// Get an order with its lines
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<Order> {
        let mut conn = self.db.acquire().await?;
        load_order(&mut conn, order_id, false).await
    }

    /// Advisory check for lines that are not (yet) an order
    pub async fn check_availability(&self, input: AvailabilityInput) -> AppResult<AvailabilityReport> {
        input.validate()?;
        shared::validate_order_lines(&input.lines).map_err(|msg| AppError::validation("lines", msg))?;

        let mut conn = self.db.acquire().await?;
        let mut store = PgStore::new(&mut conn);
        AvailabilityChecker.check(&mut store, &input.lines).await
    }

    /// Move an order to `target`, running its stock effect in the same transaction
    pub async fn change_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor: &str,
    ) -> AppResult<StatusChange> {
        let mut tx = self.db.begin().await?;

        let order = load_order(&mut tx, order_id, true).await?;
        let from = order.status;

        let outcome = {
            let mut store = PgStore::new(&mut tx);
            run_transition(&mut store, &order, target, actor).await
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                tx.rollback().await?;
                match &err {
                    AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                        tracing::error!(
                            order_id = %order_id,
                            from = from.as_str(),
                            to = target.as_str(),
                            error = %err,
                            "Order transition failed, rolled back"
                        );
                    }
                    _ => {
                        tracing::debug!(
                            order_id = %order_id,
                            from = from.as_str(),
                            to = target.as_str(),
                            error = %err,
                            "Order transition rejected"
                        );
                    }
                }
                return Err(err);
            }
        };

        if outcome.effect == TransitionEffect::CollectPayment {
            sqlx::query(
                r#"
                UPDATE orders
                SET status = $1, paid_amount = total_amount, paid_at = NOW(), updated_at = NOW()
                WHERE id = $2
                "#,
            )
            .bind(target.as_str())
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(target.as_str())
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        let order = load_order(&mut tx, order_id, false).await?;

        tx.commit().await?;

        let movements = outcome.receipt.map(|r| r.movements).unwrap_or_default();

        tracing::info!(
            order_id = %order_id,
            from = from.as_str(),
            to = target.as_str(),
            movements = movements.len(),
            actor = actor,
            "Order status changed"
        );

        Ok(StatusChange { order, movements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MovementReason, StockLocation};

    use crate::services::consumption::tests::order;
    use crate::services::testing::MemoryStore;

    #[tokio::test]
    async fn test_cancel_pending_order_records_nothing() {
        let cake = Uuid::new_v4();
        let flour = Uuid::new_v4();
        let mut store = MemoryStore::default()
            .with_recipe(MemoryStore::single_line_recipe(cake, flour, 4000, 12))
            .with_stock(flour, StockLocation::Warehouse, 5000);
        let pending = order(OrderType::CustomerOrder, OrderStatus::Pending, vec![(cake, 20)]);

        let outcome = run_transition(&mut store, &pending, OrderStatus::Cancelled, "clerk")
            .await
            .unwrap();

        assert_eq!(outcome.effect, TransitionEffect::None);
        assert!(outcome.receipt.is_none());
        assert!(store.movements.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_delivered_order_is_invalid_transition() {
        let mut store = MemoryStore::default();
        let delivered = order(
            OrderType::CustomerOrder,
            OrderStatus::Delivered,
            vec![(Uuid::new_v4(), 1)],
        );

        let err = run_transition(&mut store, &delivered, OrderStatus::Cancelled, "clerk")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn test_start_production_requires_stock() {
        let cake = Uuid::new_v4();
        let flour = Uuid::new_v4();
        let mut store = MemoryStore::default()
            .with_recipe(MemoryStore::single_line_recipe(cake, flour, 4000, 12))
            .with_stock(flour, StockLocation::Warehouse, 5000);
        let pending = order(OrderType::CustomerOrder, OrderStatus::Pending, vec![(cake, 20)]);

        let err = run_transition(&mut store, &pending, OrderStatus::InProduction, "baker")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { .. }));

        store = store.with_stock(flour, StockLocation::Warehouse, 8000);
        let outcome = run_transition(&mut store, &pending, OrderStatus::InProduction, "baker")
            .await
            .unwrap();
        assert_eq!(outcome.effect, TransitionEffect::RequireAvailability);
        assert!(store.movements.is_empty());
    }

    #[tokio::test]
    async fn test_ready_at_shop_consumes_stock() {
        let cake = Uuid::new_v4();
        let flour = Uuid::new_v4();
        let mut store = MemoryStore::default()
            .with_recipe(MemoryStore::single_line_recipe(cake, flour, 4000, 12))
            .with_stock(flour, StockLocation::Warehouse, 8000);
        let in_production = order(OrderType::CustomerOrder, OrderStatus::InProduction, vec![(cake, 20)]);

        let outcome = run_transition(&mut store, &in_production, OrderStatus::ReadyAtShop, "baker")
            .await
            .unwrap();

        assert_eq!(outcome.effect, TransitionEffect::Consume);
        assert_eq!(outcome.receipt.map(|r| r.movements.len()), Some(2));
        assert_eq!(store.balance(cake, StockLocation::Counter), Decimal::from(20));
    }

    #[tokio::test]
    async fn test_cancel_after_consumption_reverses() {
        let cake = Uuid::new_v4();
        let flour = Uuid::new_v4();
        let mut store = MemoryStore::default()
            .with_recipe(MemoryStore::single_line_recipe(cake, flour, 4000, 12))
            .with_stock(flour, StockLocation::Warehouse, 8000);
        let mut customer = order(OrderType::CustomerOrder, OrderStatus::InProduction, vec![(cake, 20)]);

        run_transition(&mut store, &customer, OrderStatus::ReadyAtShop, "baker")
            .await
            .unwrap();
        customer.status = OrderStatus::ReadyAtShop;

        let outcome = run_transition(&mut store, &customer, OrderStatus::Cancelled, "manager")
            .await
            .unwrap();

        assert_eq!(outcome.effect, TransitionEffect::Reverse);
        assert_eq!(store.balance(flour, StockLocation::Warehouse), Decimal::from(8000));
        assert_eq!(store.balance(cake, StockLocation::Counter), Decimal::ZERO);
        assert_eq!(
            store
                .movements
                .iter()
                .filter(|m| m.reason == MovementReason::OrderCancellation)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_counter_request_completes_with_consumption() {
        let roll = Uuid::new_v4();
        let flour = Uuid::new_v4();
        let mut store = MemoryStore::default()
            .with_recipe(MemoryStore::single_line_recipe(roll, flour, 60, 1))
            .with_stock(flour, StockLocation::Warehouse, 1000);
        let request = order(
            OrderType::CounterProductionRequest,
            OrderStatus::InProduction,
            vec![(roll, 10)],
        );

        let err = run_transition(&mut store, &request, OrderStatus::ReadyAtShop, "baker")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));

        run_transition(&mut store, &request, OrderStatus::Completed, "baker")
            .await
            .unwrap();
        assert_eq!(store.balance(flour, StockLocation::Warehouse), Decimal::from(400));
        assert_eq!(store.balance(roll, StockLocation::Counter), Decimal::from(10));
    }

    #[test]
    fn test_create_input_requires_lines() {
        let input = CreateOrderInput {
            order_type: OrderType::CounterProductionRequest,
            customer_name: None,
            customer_phone: None,
            due_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            notes: None,
            lines: vec![],
        };
        assert!(input.validate().is_err());
    }
}
