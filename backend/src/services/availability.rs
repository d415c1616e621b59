//! Advisory availability check for prospective orders

use std::collections::HashMap;

use shared::{AvailabilityReport, OrderLine, RequirementSet};

use crate::error::AppResult;
use crate::services::ledger::StockLedger;
use crate::services::recipe::RecipeResolver;

/// Decides whether an order's ingredients can be covered right now.
///
/// Reads balances without locking; the result is advisory and is re-validated
/// under lock when the order is actually produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityChecker;

impl AvailabilityChecker {
    /// Resolve every distinct product once and aggregate the order's requirements
    pub async fn requirements<S>(&self, store: &mut S, lines: &[OrderLine]) -> AppResult<RequirementSet>
    where
        S: RecipeResolver,
    {
        let mut recipes = HashMap::new();
        for line in lines {
            if recipes.contains_key(&line.product_id) {
                continue;
            }
            if let Some(recipe) = store.resolve(line.product_id).await? {
                recipes.insert(line.product_id, recipe);
            }
        }

        Ok(RequirementSet::build(lines, &recipes)?)
    }

    pub async fn check<S>(&self, store: &mut S, lines: &[OrderLine]) -> AppResult<AvailabilityReport>
    where
        S: StockLedger + RecipeResolver,
    {
        let requirements = self.requirements(store, lines).await?;

        let mut balances = HashMap::new();
        for requirement in requirements.ingredients() {
            let balance = store
                .get_balance(requirement.product_id, requirement.location)
                .await?;
            balances.insert((requirement.product_id, requirement.location), balance);
        }

        let report = requirements.evaluate(|product_id, location| {
            balances
                .get(&(product_id, location))
                .copied()
                .unwrap_or_default()
        });

        if !report.is_sufficient {
            tracing::debug!(shortfalls = report.shortfalls.len(), "Order cannot start production");
        }

        Ok(report)
    }
}
