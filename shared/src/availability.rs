//! Recipe-driven stock requirements for an order
//!
//! Requirements are aggregated per (ingredient, production location) across
//! every line of an order before they are compared with stock, so two lines
//! competing for the same ingredient are judged together. The same
//! yield-normalised figures drive both the advisory availability check and the
//! actual consumption.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{round_quantity, OrderLine, RecipeInfo, StockLocation};

/// Total amount of one ingredient an order needs from one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub product_id: Uuid,
    pub product_name: String,
    pub location: StockLocation,
    pub quantity: Decimal,
}

/// An ingredient the ledger cannot cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortfall {
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub location: StockLocation,
    pub needed: Decimal,
    pub available: Decimal,
}

impl Shortfall {
    pub fn missing(&self) -> Decimal {
        self.needed - self.available
    }
}

/// Result of comparing an order's requirements against stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub is_sufficient: bool,
    pub shortfalls: Vec<Shortfall>,
}

/// Aggregated ingredient debits and finished-goods credits for one order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequirementSet {
    ingredients: BTreeMap<(Uuid, StockLocation), Requirement>,
    production: BTreeMap<Uuid, Decimal>,
}

fn add_quantity(total: Decimal, more: Decimal) -> DomainResult<Decimal> {
    total
        .checked_add(more)
        .ok_or_else(|| DomainError::InvalidQuantity("aggregated requirement overflows".to_string()))
}

impl RequirementSet {
    /// Build the requirement set for `lines`.
    ///
    /// `recipes` holds the resolved recipe of every finished product that has
    /// one; products missing from the map are unconstrained and produce neither
    /// debits nor credits.
    pub fn build(lines: &[OrderLine], recipes: &HashMap<Uuid, RecipeInfo>) -> DomainResult<Self> {
        let mut set = RequirementSet::default();

        for line in lines {
            if line.quantity <= Decimal::ZERO {
                return Err(DomainError::InvalidQuantity(format!(
                    "order quantity for product {} must be positive",
                    line.product_id
                )));
            }

            let Some(recipe) = recipes.get(&line.product_id) else {
                continue;
            };

            for recipe_line in &recipe.lines {
                let needed = recipe.requirement_for(recipe_line, line.quantity)?;
                let key = (recipe_line.ingredient_id, recipe.production_location);
                match set.ingredients.entry(key) {
                    Entry::Occupied(mut entry) => {
                        let requirement = entry.get_mut();
                        requirement.quantity = add_quantity(requirement.quantity, needed)?;
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(Requirement {
                            product_id: recipe_line.ingredient_id,
                            product_name: recipe_line.ingredient_name.clone(),
                            location: recipe.production_location,
                            quantity: needed,
                        });
                    }
                }
            }

            let produced = set.production.entry(line.product_id).or_default();
            *produced = add_quantity(*produced, line.quantity)?;
        }

        for requirement in set.ingredients.values_mut() {
            requirement.quantity = round_quantity(requirement.quantity);
        }
        set.ingredients.retain(|_, r| r.quantity > Decimal::ZERO);

        Ok(set)
    }

    /// Ingredient requirements in (product id, location) order
    pub fn ingredients(&self) -> impl Iterator<Item = &Requirement> {
        self.ingredients.values()
    }

    /// Finished goods to credit at the counter, by product id
    pub fn production(&self) -> impl Iterator<Item = (Uuid, Decimal)> + '_ {
        self.production.iter().map(|(id, qty)| (*id, *qty))
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty() && self.production.is_empty()
    }

    /// Compare every requirement with the balance reported by `balance`.
    pub fn evaluate<F>(&self, balance: F) -> AvailabilityReport
    where
        F: Fn(Uuid, StockLocation) -> Decimal,
    {
        let shortfalls: Vec<Shortfall> = self
            .ingredients()
            .filter_map(|r| {
                let available = balance(r.product_id, r.location);
                (available < r.quantity).then(|| Shortfall {
                    product_id: r.product_id,
                    product_name: Some(r.product_name.clone()),
                    location: r.location,
                    needed: r.quantity,
                    available,
                })
            })
            .collect();

        AvailabilityReport {
            is_sufficient: shortfalls.is_empty(),
            shortfalls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecipeLine;

    fn recipe(product_id: Uuid, ingredient: Uuid, needed: i64, yield_qty: i64) -> RecipeInfo {
        RecipeInfo {
            recipe_id: Uuid::new_v4(),
            product_id,
            production_location: StockLocation::Warehouse,
            yield_quantity: Decimal::from(yield_qty),
            lines: vec![RecipeLine {
                ingredient_id: ingredient,
                ingredient_name: "Butter".to_string(),
                quantity_needed: Decimal::from(needed),
                unit: "g".to_string(),
            }],
        }
    }

    fn line(product_id: Uuid, quantity: i64) -> OrderLine {
        OrderLine {
            product_id,
            quantity: Decimal::from(quantity),
            unit_price: Decimal::ONE,
        }
    }

    #[test]
    fn test_shared_ingredient_is_summed_across_lines() {
        let butter = Uuid::new_v4();
        let croissant = Uuid::new_v4();
        let brioche = Uuid::new_v4();
        let recipes = HashMap::from([
            (croissant, recipe(croissant, butter, 100, 10)),
            (brioche, recipe(brioche, butter, 300, 10)),
        ]);

        let set = RequirementSet::build(&[line(croissant, 10), line(brioche, 10)], &recipes).unwrap();
        let reqs: Vec<_> = set.ingredients().collect();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].quantity, Decimal::from(400));

        // each line alone fits in 350 g, together they do not
        let report = set.evaluate(|_, _| Decimal::from(350));
        assert!(!report.is_sufficient);
        assert_eq!(report.shortfalls[0].missing(), Decimal::from(50));
    }

    #[test]
    fn test_product_without_recipe_is_unconstrained() {
        let set = RequirementSet::build(&[line(Uuid::new_v4(), 5)], &HashMap::new()).unwrap();
        assert!(set.is_empty());
        assert!(set.evaluate(|_, _| Decimal::ZERO).is_sufficient);
    }

    #[test]
    fn test_non_positive_order_quantity_rejected() {
        let result = RequirementSet::build(&[line(Uuid::new_v4(), 0)], &HashMap::new());
        assert!(matches!(result, Err(DomainError::InvalidQuantity(_))));
    }

    #[test]
    fn test_requirement_overflow_is_invalid_quantity() {
        let cake = Uuid::new_v4();
        let recipes = HashMap::from([(cake, recipe(cake, Uuid::new_v4(), 4000, 1))]);
        let huge = OrderLine {
            product_id: cake,
            quantity: Decimal::from_i128_with_scale(10_i128.pow(26), 0),
            unit_price: Decimal::ONE,
        };

        let result = RequirementSet::build(&[huge], &recipes);
        assert!(matches!(result, Err(DomainError::InvalidQuantity(_))));
    }

    #[test]
    fn test_aggregate_overflow_is_invalid_quantity() {
        let bun = Uuid::new_v4();
        let recipes = HashMap::from([(bun, recipe(bun, Uuid::new_v4(), 1, 1))]);
        let half = OrderLine {
            product_id: bun,
            quantity: Decimal::from_i128_with_scale(5 * 10_i128.pow(28), 0),
            unit_price: Decimal::ONE,
        };

        let result = RequirementSet::build(&[half.clone(), half], &recipes);
        assert!(matches!(result, Err(DomainError::InvalidQuantity(_))));
    }

    #[test]
    fn test_production_credit_sums_repeated_product() {
        let bread = Uuid::new_v4();
        let recipes = HashMap::from([(bread, recipe(bread, Uuid::new_v4(), 500, 1))]);
        let set = RequirementSet::build(&[line(bread, 2), line(bread, 3)], &recipes).unwrap();
        assert_eq!(set.production().collect::<Vec<_>>(), vec![(bread, Decimal::from(5))]);
    }
}
