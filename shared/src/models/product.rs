//! Product master data as seen by the stock engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StockLevels, StockLocation};

/// A product held in stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Unit of measure (e.g. "g", "pcs", "l")
    pub unit: String,
    pub product_type: ProductType,
    pub cost_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub is_active: bool,
    pub stock: StockLevels,
    pub minimum_stock: StockLevels,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Ingredient,
    Finished,
    Consumable,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Ingredient => "ingredient",
            ProductType::Finished => "finished",
            ProductType::Consumable => "consumable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingredient" => Some(ProductType::Ingredient),
            "finished" => Some(ProductType::Finished),
            "consumable" => Some(ProductType::Consumable),
            _ => None,
        }
    }
}

/// A location where a product sits below its configured minimum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockEntry {
    pub product_id: Uuid,
    pub product_name: String,
    pub location: StockLocation,
    pub balance: Decimal,
    pub minimum: Decimal,
}

impl Product {
    /// Locations whose balance is strictly below a positive minimum
    pub fn low_stock_locations(&self) -> Vec<LowStockEntry> {
        StockLocation::ALL
            .iter()
            .filter_map(|&location| {
                let minimum = self.minimum_stock.get(location);
                let balance = self.stock.get(location);
                (minimum > Decimal::ZERO && balance < minimum).then(|| LowStockEntry {
                    product_id: self.id,
                    product_name: self.name.clone(),
                    location,
                    balance,
                    minimum,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: StockLevels, minimum_stock: StockLevels) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Rye flour".to_string(),
            unit: "g".to_string(),
            product_type: ProductType::Ingredient,
            cost_price: Decimal::ZERO,
            sale_price: None,
            is_active: true,
            stock,
            minimum_stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_low_stock_ignores_unset_minimums() {
        let p = product(StockLevels::default(), StockLevels::default());
        assert!(p.low_stock_locations().is_empty());
    }

    #[test]
    fn test_low_stock_reports_only_short_locations() {
        let stock = StockLevels {
            warehouse: Decimal::from(500),
            counter: Decimal::from(20),
            ..Default::default()
        };
        let minimum = StockLevels {
            warehouse: Decimal::from(1000),
            counter: Decimal::from(20),
            ..Default::default()
        };
        let entries = product(stock, minimum).low_stock_locations();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].location, StockLocation::Warehouse);
        assert_eq!(entries[0].balance, Decimal::from(500));
    }
}
