//! Validation utilities for the Bakery Back-Office
//!
//! Input checks run before anything touches the ledger.

use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{order_total, MovementReason, OrderLine, StockLocation, QUANTITY_SCALE};

/// Decimal places kept for money (matches NUMERIC(14,2) columns)
pub const AMOUNT_SCALE: u32 = 2;

/// Exclusive magnitude bound for stored quantities: 1e11, the NUMERIC(14,3) range
pub const QUANTITY_LIMIT: Decimal = Decimal::from_parts(0x4876_E800, 23, 0, false, 0);

/// Exclusive bound for stored amounts: 1e12, the NUMERIC(14,2) range
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(0xD4A5_1000, 232, 0, false, 0);

/// Check that a quantity fits the stored precision without rounding
fn validate_stored_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity.abs() >= QUANTITY_LIMIT {
        return Err("Quantity is too large");
    }
    if quantity.normalize().scale() > QUANTITY_SCALE {
        return Err("Quantity allows at most 3 decimal places");
    }
    Ok(())
}

fn validate_stored_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount.abs() >= AMOUNT_LIMIT {
        return Err("Amount is too large");
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err("Amount allows at most 2 decimal places");
    }
    Ok(())
}

// ============================================================================
// Stock Validations
// ============================================================================

/// Validate a quantity that must be strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    validate_stored_quantity(quantity)
}

/// Validate a manual stock adjustment
pub fn validate_adjustment(delta: Decimal, reason: MovementReason) -> Result<(), &'static str> {
    if delta.is_zero() {
        return Err("Adjustment quantity must be non-zero");
    }
    validate_stored_quantity(delta)?;
    if !reason.is_manual() {
        return Err("Reason is reserved for system movements");
    }
    match reason {
        MovementReason::Purchase | MovementReason::InitialStock if delta < Decimal::ZERO => {
            Err("Purchases and initial stock must add quantity")
        }
        MovementReason::Spoilage if delta > Decimal::ZERO => {
            Err("Spoilage must remove quantity")
        }
        _ => Ok(()),
    }
}

/// Validate a transfer between two locations
pub fn validate_transfer(
    from: StockLocation,
    to: StockLocation,
    quantity: Decimal,
) -> Result<(), &'static str> {
    if from == to {
        return Err("Source and destination locations must differ");
    }
    validate_positive_quantity(quantity)
}

/// Validate a minimum stock threshold
pub fn validate_minimum_stock(minimum: Decimal) -> Result<(), &'static str> {
    if minimum < Decimal::ZERO {
        return Err("Minimum stock cannot be negative");
    }
    validate_stored_quantity(minimum)
}

// ============================================================================
// Recipe Validations
// ============================================================================

/// Validate recipe header and ingredient list
pub fn validate_recipe(
    product_id: Uuid,
    yield_quantity: Decimal,
    ingredients: &[(Uuid, Decimal)],
) -> Result<(), &'static str> {
    if yield_quantity <= Decimal::ZERO {
        return Err("Recipe yield must be positive");
    }
    validate_stored_quantity(yield_quantity)?;
    if ingredients.is_empty() {
        return Err("Recipe must have at least one ingredient");
    }

    let mut seen = HashSet::new();
    for (ingredient_id, quantity) in ingredients {
        if *ingredient_id == product_id {
            return Err("A recipe cannot use its own product as an ingredient");
        }
        if *quantity <= Decimal::ZERO {
            return Err("Ingredient quantities must be positive");
        }
        validate_stored_quantity(*quantity)?;
        if !seen.insert(*ingredient_id) {
            return Err("Each ingredient may appear only once per recipe");
        }
    }
    Ok(())
}

// ============================================================================
// Order Validations
// ============================================================================

/// Validate the lines of a new order
pub fn validate_order_lines(lines: &[OrderLine]) -> Result<(), &'static str> {
    if lines.is_empty() {
        return Err("Order must have at least one line");
    }
    for line in lines {
        if line.quantity <= Decimal::ZERO {
            return Err("Order quantities must be positive");
        }
        if line.unit_price < Decimal::ZERO {
            return Err("Unit price cannot be negative");
        }
        validate_stored_quantity(line.quantity)?;
        validate_stored_amount(line.unit_price)?;
    }
    match order_total(lines) {
        Ok(total) if total < AMOUNT_LIMIT => Ok(()),
        _ => Err("Order total is too large"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive_quantity() {
        assert!(validate_positive_quantity(Decimal::ONE).is_ok());
        assert!(validate_positive_quantity(Decimal::ZERO).is_err());
        assert!(validate_positive_quantity(Decimal::NEGATIVE_ONE).is_err());
    }

    #[test]
    fn test_limits_match_column_ranges() {
        assert_eq!(QUANTITY_LIMIT, Decimal::from(100_000_000_000_i64));
        assert_eq!(AMOUNT_LIMIT, Decimal::from(1_000_000_000_000_i64));
    }

    #[test]
    fn test_validate_positive_quantity_bounds() {
        assert!(validate_positive_quantity(Decimal::new(99_999_999_999_999, 3)).is_ok());
        assert!(validate_positive_quantity(QUANTITY_LIMIT).is_err());
        assert!(validate_positive_quantity(Decimal::MAX).is_err());
    }

    #[test]
    fn test_validate_positive_quantity_scale() {
        // 0.0004 would round to zero in storage, 1.2345 to 1.235
        assert!(validate_positive_quantity(Decimal::new(4, 4)).is_err());
        assert!(validate_positive_quantity(Decimal::new(12345, 4)).is_err());
        assert!(validate_positive_quantity(Decimal::new(1235, 3)).is_ok());
        // trailing zeros do not count
        assert!(validate_positive_quantity(Decimal::new(12340, 4)).is_ok());
    }

    #[test]
    fn test_validate_adjustment_bounds() {
        assert!(validate_adjustment(Decimal::MAX, MovementReason::Correction).is_err());
        assert!(validate_adjustment(Decimal::MIN, MovementReason::Correction).is_err());
        assert!(validate_adjustment(Decimal::new(4, 4), MovementReason::Correction).is_err());
        assert!(validate_adjustment(Decimal::new(-1500, 3), MovementReason::Spoilage).is_ok());
    }

    #[test]
    fn test_validate_minimum_stock_bounds() {
        assert!(validate_minimum_stock(Decimal::ZERO).is_ok());
        assert!(validate_minimum_stock(QUANTITY_LIMIT).is_err());
        assert!(validate_minimum_stock(Decimal::new(1, 4)).is_err());
    }

    #[test]
    fn test_validate_adjustment_purchase_must_add() {
        assert!(validate_adjustment(Decimal::from(5), MovementReason::Purchase).is_ok());
        assert!(validate_adjustment(Decimal::from(-5), MovementReason::Purchase).is_err());
    }

    #[test]
    fn test_validate_adjustment_spoilage_must_remove() {
        assert!(validate_adjustment(Decimal::from(-2), MovementReason::Spoilage).is_ok());
        assert!(validate_adjustment(Decimal::from(2), MovementReason::Spoilage).is_err());
    }

    #[test]
    fn test_validate_adjustment_correction_either_sign() {
        assert!(validate_adjustment(Decimal::from(2), MovementReason::Correction).is_ok());
        assert!(validate_adjustment(Decimal::from(-2), MovementReason::Correction).is_ok());
        assert!(validate_adjustment(Decimal::ZERO, MovementReason::Correction).is_err());
    }

    #[test]
    fn test_validate_adjustment_rejects_system_reasons() {
        assert!(validate_adjustment(Decimal::ONE, MovementReason::OrderProduction).is_err());
        assert!(validate_adjustment(Decimal::ONE, MovementReason::TransferIn).is_err());
    }

    #[test]
    fn test_validate_transfer() {
        let qty = Decimal::from(3);
        assert!(validate_transfer(StockLocation::Warehouse, StockLocation::LocalProduction, qty).is_ok());
        assert!(validate_transfer(StockLocation::Warehouse, StockLocation::Warehouse, qty).is_err());
        assert!(validate_transfer(StockLocation::Warehouse, StockLocation::Counter, Decimal::ZERO).is_err());
    }

    #[test]
    fn test_validate_recipe() {
        let product = Uuid::new_v4();
        let flour = Uuid::new_v4();
        let yeast = Uuid::new_v4();
        let ok = [(flour, Decimal::from(500)), (yeast, Decimal::from(7))];
        assert!(validate_recipe(product, Decimal::from(2), &ok).is_ok());
        assert!(validate_recipe(product, Decimal::ZERO, &ok).is_err());
        assert!(validate_recipe(product, Decimal::ONE, &[]).is_err());
        assert!(validate_recipe(product, Decimal::ONE, &[(product, Decimal::ONE)]).is_err());
        assert!(validate_recipe(product, Decimal::ONE, &[(flour, Decimal::ONE), (flour, Decimal::ONE)]).is_err());
        assert!(validate_recipe(product, Decimal::ONE, &[(flour, Decimal::ZERO)]).is_err());
        assert!(validate_recipe(product, Decimal::new(15, 4), &ok).is_err());
        assert!(validate_recipe(product, Decimal::ONE, &[(flour, Decimal::MAX)]).is_err());
    }

    #[test]
    fn test_validate_order_lines() {
        let line = |q: i64, p: i64| OrderLine {
            product_id: Uuid::new_v4(),
            quantity: Decimal::from(q),
            unit_price: Decimal::from(p),
        };
        assert!(validate_order_lines(&[line(1, 2)]).is_ok());
        assert!(validate_order_lines(&[]).is_err());
        assert!(validate_order_lines(&[line(0, 2)]).is_err());
        assert!(validate_order_lines(&[line(1, -1)]).is_err());
    }

    #[test]
    fn test_validate_order_lines_rejects_unstorable_values() {
        let line = |quantity: Decimal, unit_price: Decimal| OrderLine {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
        };
        let huge = Decimal::from_i128_with_scale(10_i128.pow(26), 0);
        assert!(validate_order_lines(&[line(huge, Decimal::ONE)]).is_err());
        assert!(validate_order_lines(&[line(Decimal::new(4, 4), Decimal::ONE)]).is_err());
        assert!(validate_order_lines(&[line(Decimal::ONE, Decimal::new(1999, 3))]).is_err());
        assert!(validate_order_lines(&[line(Decimal::ONE, AMOUNT_LIMIT)]).is_err());

        // each line fits, the total does not
        let big = line(Decimal::from(1_000_000_i64), Decimal::from(999_999_i64));
        assert!(validate_order_lines(&[big.clone()]).is_ok());
        assert!(validate_order_lines(&[big.clone(), big]).is_err());
    }
}
