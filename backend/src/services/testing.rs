//! In-memory ledger and recipe store for unit tests

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    checked_balance, DomainError, RecipeInfo, RecipeLine, StockLocation, StockMovement,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::ledger::{AppliedDelta, StockChange, StockLedger};
use crate::services::recipe::RecipeResolver;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub balances: HashMap<(Uuid, StockLocation), Decimal>,
    pub movements: Vec<StockMovement>,
    pub recipes: HashMap<Uuid, RecipeInfo>,
    pub inactive: HashSet<Uuid>,
    /// Rows passed to `balance_for_update`, in call order
    pub locks: Vec<(Uuid, StockLocation)>,
}

impl MemoryStore {
    pub fn with_stock(
        mut self,
        product_id: Uuid,
        location: StockLocation,
        quantity: impl Into<Decimal>,
    ) -> Self {
        self.balances.insert((product_id, location), quantity.into());
        self
    }

    pub fn with_recipe(mut self, recipe: RecipeInfo) -> Self {
        self.recipes.insert(recipe.product_id, recipe);
        self
    }

    pub fn with_inactive(mut self, product_id: Uuid) -> Self {
        self.inactive.insert(product_id);
        self
    }

    pub fn balance(&self, product_id: Uuid, location: StockLocation) -> Decimal {
        self.balances
            .get(&(product_id, location))
            .copied()
            .unwrap_or_default()
    }

    /// Recipe at the warehouse with a single ingredient
    pub fn single_line_recipe(
        product_id: Uuid,
        ingredient_id: Uuid,
        quantity_needed: i64,
        yield_quantity: i64,
    ) -> RecipeInfo {
        RecipeInfo {
            recipe_id: Uuid::new_v4(),
            product_id,
            production_location: StockLocation::Warehouse,
            yield_quantity: Decimal::from(yield_quantity),
            lines: vec![RecipeLine {
                ingredient_id,
                ingredient_name: format!("ingredient-{}", ingredient_id),
                quantity_needed: Decimal::from(quantity_needed),
                unit: "g".to_string(),
            }],
        }
    }
}

impl StockLedger for MemoryStore {
    async fn get_balance(&mut self, product_id: Uuid, location: StockLocation) -> AppResult<Decimal> {
        Ok(self.balance(product_id, location))
    }

    async fn balance_for_update(
        &mut self,
        product_id: Uuid,
        location: StockLocation,
    ) -> AppResult<Decimal> {
        self.locks.push((product_id, location));
        Ok(self.balance(product_id, location))
    }

    async fn apply_delta(&mut self, change: StockChange) -> AppResult<AppliedDelta> {
        let before = self.balance(change.product_id, change.location);
        let after = checked_balance(change.product_id, change.location, before, change.delta)?;
        self.balances.insert((change.product_id, change.location), after);

        let movement = StockMovement {
            id: Uuid::new_v4(),
            product_id: change.product_id,
            location: change.location,
            delta: change.delta,
            stock_before: before,
            stock_after: after,
            order_id: change.order_id,
            reason: change.reason,
            actor: change.actor,
            created_at: Utc::now(),
        };
        self.movements.push(movement.clone());

        Ok(AppliedDelta {
            new_balance: after,
            movement,
        })
    }

    async fn movements_for_order(&mut self, order_id: Uuid) -> AppResult<Vec<StockMovement>> {
        Ok(self
            .movements
            .iter()
            .filter(|m| m.order_id == Some(order_id))
            .cloned()
            .collect())
    }
}

impl RecipeResolver for MemoryStore {
    async fn resolve(&mut self, product_id: Uuid) -> AppResult<Option<RecipeInfo>> {
        let Some(recipe) = self.recipes.get(&product_id) else {
            return Ok(None);
        };

        if let Some(line) = recipe
            .lines
            .iter()
            .find(|l| self.inactive.contains(&l.ingredient_id))
        {
            return Err(DomainError::InvalidRecipe {
                recipe_id: recipe.recipe_id,
                reason: format!("ingredient {} is missing or inactive", line.ingredient_id),
            }
            .into());
        }

        Ok(Some(recipe.clone()))
    }
}
