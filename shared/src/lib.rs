//! Shared types and models for the Bakery Back-Office
//!
//! This crate holds the domain types and the pure stock arithmetic used by the
//! backend: locations, recipes, orders, the order status machine and the
//! requirement/availability calculation.

pub mod availability;
pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use availability::*;
pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
