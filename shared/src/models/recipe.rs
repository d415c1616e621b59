//! Recipes (bills of materials) for finished products

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StockLocation;
use crate::error::{DomainError, DomainResult};

/// Decimal places kept for stock quantities (matches NUMERIC(14,3) columns)
pub const QUANTITY_SCALE: u32 = 3;

/// Round a computed quantity to the stored precision, half away from zero
pub fn round_quantity(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    /// The finished product this recipe makes
    pub product_id: Uuid,
    /// Units of finished product made by one full execution
    pub yield_quantity: Decimal,
    /// Location the ingredients are drawn from
    pub production_location: StockLocation,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One ingredient of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    /// Amount consumed per full execution, not per output unit
    pub quantity_needed: Decimal,
    pub unit: String,
}

/// Everything the stock engine needs to know about a finished product's recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeInfo {
    pub recipe_id: Uuid,
    pub product_id: Uuid,
    pub production_location: StockLocation,
    pub yield_quantity: Decimal,
    pub lines: Vec<RecipeLine>,
}

impl RecipeInfo {
    /// Amount of one ingredient needed per single unit of output.
    pub fn per_unit_requirement(&self, line: &RecipeLine) -> DomainResult<Decimal> {
        per_unit_requirement(self.recipe_id, line, self.yield_quantity)
    }

    /// Exact (unrounded) amount of `line` needed to make `ordered` units
    pub fn requirement_for(&self, line: &RecipeLine, ordered: Decimal) -> DomainResult<Decimal> {
        self.per_unit_requirement(line)?
            .checked_mul(ordered)
            .ok_or_else(|| {
                DomainError::InvalidQuantity(format!(
                    "requirement of {} for {} units overflows",
                    line.ingredient_name, ordered
                ))
            })
    }
}

/// `quantity_needed / yield_quantity`, refusing data that cannot be divided.
pub fn per_unit_requirement(
    recipe_id: Uuid,
    line: &RecipeLine,
    yield_quantity: Decimal,
) -> DomainResult<Decimal> {
    if yield_quantity <= Decimal::ZERO {
        return Err(DomainError::InvalidRecipe {
            recipe_id,
            reason: format!("yield quantity must be positive, got {}", yield_quantity),
        });
    }
    if line.quantity_needed <= Decimal::ZERO {
        return Err(DomainError::InvalidRecipe {
            recipe_id,
            reason: format!(
                "ingredient {} has non-positive quantity {}",
                line.ingredient_name, line.quantity_needed
            ),
        });
    }

    line.quantity_needed
        .checked_div(yield_quantity)
        .ok_or_else(|| DomainError::InvalidRecipe {
            recipe_id,
            reason: "requirement overflows".to_string(),
        })
}
