//! Business logic services for the Bakery Back-Office

pub mod availability;
pub mod consumption;
pub mod ledger;
pub mod order;
pub mod recipe;
pub mod stock;
pub mod store;

#[cfg(test)]
pub mod testing;

pub use order::OrderService;
pub use recipe::RecipeService;
pub use stock::StockService;
