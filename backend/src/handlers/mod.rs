//! HTTP request handlers

pub mod health;
pub mod orders;
pub mod recipes;
pub mod stock;

pub use health::*;
pub use orders::*;
pub use recipes::*;
pub use stock::*;
