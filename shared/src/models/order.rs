//! Orders and the order status state machine

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Placed by a customer, collected or delivered later
    CustomerOrder,
    /// Internal request to restock the shop counter
    CounterProductionRequest,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::CustomerOrder => "customer_order",
            OrderType::CounterProductionRequest => "counter_production_request",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer_order" => Some(OrderType::CustomerOrder),
            "counter_production_request" => Some(OrderType::CounterProductionRequest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProduction,
    ReadyAtShop,
    OutForDelivery,
    AwaitingPayment,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProduction => "in_production",
            OrderStatus::ReadyAtShop => "ready_at_shop",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::AwaitingPayment => "awaiting_payment",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "in_production" => Some(OrderStatus::InProduction),
            "ready_at_shop" => Some(OrderStatus::ReadyAtShop),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "awaiting_payment" => Some(OrderStatus::AwaitingPayment),
            "delivered" => Some(OrderStatus::Delivered),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Initial status from the availability check at creation time
    pub fn initial(is_sufficient: bool) -> Self {
        if is_sufficient {
            OrderStatus::InProduction
        } else {
            OrderStatus::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// Production has not happened yet; stock can still be consumed
    pub fn can_be_received_at_shop(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::InProduction)
    }

    pub fn can_be_delivered(&self, order_type: OrderType) -> bool {
        order_type == OrderType::CustomerOrder
            && matches!(self, OrderStatus::ReadyAtShop | OrderStatus::OutForDelivery)
    }

    /// Ingredients were debited and finished goods credited for this order
    pub fn has_consumed_stock(&self) -> bool {
        matches!(
            self,
            OrderStatus::ReadyAtShop | OrderStatus::OutForDelivery | OrderStatus::AwaitingPayment
        )
    }

    /// Status an order lands in when it is received as produced
    pub fn received(order_type: OrderType) -> Self {
        match order_type {
            OrderType::CustomerOrder => OrderStatus::ReadyAtShop,
            OrderType::CounterProductionRequest => OrderStatus::Completed,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock or payment side effect carried by a status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Availability must be sufficient before production starts
    RequireAvailability,
    /// Debit ingredients and credit finished goods
    Consume,
    /// Undo the consumption recorded for the order
    Reverse,
    /// The order amount is realized
    CollectPayment,
    None,
}

/// Decide whether `from -> to` is allowed for an order type and what it triggers.
pub fn plan_transition(
    order_type: OrderType,
    from: OrderStatus,
    to: OrderStatus,
) -> DomainResult<TransitionEffect> {
    use OrderStatus::*;

    let customer = order_type == OrderType::CustomerOrder;
    let effect = match (from, to) {
        (Pending, InProduction) => Some(TransitionEffect::RequireAvailability),
        (_, ReadyAtShop) if customer && from.can_be_received_at_shop() => {
            Some(TransitionEffect::Consume)
        }
        (_, Completed) if !customer && from.can_be_received_at_shop() => {
            Some(TransitionEffect::Consume)
        }
        (ReadyAtShop, OutForDelivery) if customer => Some(TransitionEffect::None),
        (_, Delivered) if from.can_be_delivered(order_type) => {
            Some(TransitionEffect::CollectPayment)
        }
        (ReadyAtShop | OutForDelivery, AwaitingPayment) if customer => {
            Some(TransitionEffect::None)
        }
        (AwaitingPayment, Completed) => Some(TransitionEffect::CollectPayment),
        (_, Cancelled) if !from.is_terminal() => Some(if from.has_consumed_stock() {
            TransitionEffect::Reverse
        } else {
            TransitionEffect::None
        }),
        _ => None,
    };

    effect.ok_or(DomainError::InvalidTransition { from, to })
}

/// An order with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub paid_amount: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Sum of quantity × unit price over all lines
pub fn order_total(lines: &[OrderLine]) -> DomainResult<Decimal> {
    lines.iter().try_fold(Decimal::ZERO, |total, line| {
        line.quantity
            .checked_mul(line.unit_price)
            .and_then(|amount| total.checked_add(amount))
            .ok_or_else(|| DomainError::InvalidQuantity("order total overflows".to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status() {
        assert_eq!(OrderStatus::initial(true), OrderStatus::InProduction);
        assert_eq!(OrderStatus::initial(false), OrderStatus::Pending);
    }

    #[test]
    fn test_received_status_depends_on_order_type() {
        assert_eq!(
            OrderStatus::received(OrderType::CustomerOrder),
            OrderStatus::ReadyAtShop
        );
        assert_eq!(
            OrderStatus::received(OrderType::CounterProductionRequest),
            OrderStatus::Completed
        );
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for s in [
            "pending",
            "in_production",
            "ready_at_shop",
            "out_for_delivery",
            "awaiting_payment",
            "delivered",
            "completed",
            "cancelled",
        ] {
            assert_eq!(OrderStatus::parse(s).map(|st| st.as_str()), Some(s));
        }
    }

    #[test]
    fn test_order_total() {
        let lines = vec![
            OrderLine {
                product_id: Uuid::new_v4(),
                quantity: Decimal::from(3),
                unit_price: Decimal::new(250, 2),
            },
            OrderLine {
                product_id: Uuid::new_v4(),
                quantity: Decimal::from(2),
                unit_price: Decimal::from(4),
            },
        ];
        assert_eq!(order_total(&lines).unwrap(), Decimal::new(1550, 2));
    }

    #[test]
    fn test_order_total_rejects_overflow() {
        let lines = vec![OrderLine {
            product_id: Uuid::new_v4(),
            quantity: Decimal::from_i128_with_scale(10_i128.pow(20), 0),
            unit_price: Decimal::from(10_000_000_000_i64),
        }];
        assert!(matches!(
            order_total(&lines),
            Err(DomainError::InvalidQuantity(_))
        ));
    }
}
