//! Domain models for the Bakery Back-Office

mod order;
mod product;
mod recipe;
mod stock;

pub use order::*;
pub use product::*;
pub use recipe::*;
pub use stock::*;
