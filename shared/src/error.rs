//! Domain errors raised by stock, recipe and order rules

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{OrderStatus, StockLocation};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A debit would drive a balance below zero
    #[error("Insufficient stock for product {product_id} at {location}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        location: StockLocation,
        requested: Decimal,
        available: Decimal,
    },

    /// Recipe data cannot be used for a requirement calculation
    #[error("Invalid recipe {recipe_id}: {reason}")]
    InvalidRecipe { recipe_id: Uuid, reason: String },

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
