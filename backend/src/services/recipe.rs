//! Recipe resolution and recipe management

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{DomainError, ProductType, Recipe, RecipeInfo, RecipeLine, StockLocation};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::store::PgStore;

/// Translates a finished product into its bill of materials.
pub trait RecipeResolver: Send {
    /// The product's recipe, or `None` when it has none (unconstrained).
    ///
    /// Fails with `InvalidRecipe` when the stored recipe cannot be used.
    fn resolve(
        &mut self,
        product_id: Uuid,
    ) -> impl Future<Output = AppResult<Option<RecipeInfo>>> + Send;
}

/// Row for the recipes table
#[derive(Debug, FromRow)]
struct RecipeRow {
    id: Uuid,
    product_id: Uuid,
    yield_quantity: Decimal,
    production_location: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecipeRow> for Recipe {
    type Error = AppError;

    fn try_from(row: RecipeRow) -> Result<Self, Self::Error> {
        let production_location = StockLocation::parse(&row.production_location).ok_or_else(|| {
            AppError::from(DomainError::InvalidRecipe {
                recipe_id: row.id,
                reason: format!("unknown production location '{}'", row.production_location),
            })
        })?;

        Ok(Recipe {
            id: row.id,
            product_id: row.product_id,
            yield_quantity: row.yield_quantity,
            production_location,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Recipe ingredient joined with its product; the product side is NULL when
/// the ingredient is missing or deactivated
#[derive(Debug, FromRow)]
struct RecipeLineRow {
    ingredient_id: Uuid,
    ingredient_name: Option<String>,
    quantity_needed: Decimal,
    unit: String,
}

const RECIPE_COLUMNS: &str =
    "id, product_id, yield_quantity, production_location, notes, created_at, updated_at";

impl PgStore<'_> {
    async fn fetch_recipe(&mut self, product_id: Uuid) -> AppResult<Option<Recipe>> {
        let sql = format!("SELECT {} FROM recipes WHERE product_id = $1", RECIPE_COLUMNS);
        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(product_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        row.map(Recipe::try_from).transpose()
    }

    async fn fetch_recipe_lines(&mut self, recipe_id: Uuid) -> AppResult<Vec<RecipeLineRow>> {
        let rows = sqlx::query_as::<_, RecipeLineRow>(
            r#"
            SELECT ri.ingredient_id, p.name AS ingredient_name, ri.quantity_needed, ri.unit
            FROM recipe_ingredients ri
            LEFT JOIN products p ON p.id = ri.ingredient_id AND p.is_active
            WHERE ri.recipe_id = $1
            ORDER BY ri.position
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }
}

impl RecipeResolver for PgStore<'_> {
    async fn resolve(&mut self, product_id: Uuid) -> AppResult<Option<RecipeInfo>> {
        let Some(recipe) = self.fetch_recipe(product_id).await? else {
            return Ok(None);
        };

        if recipe.yield_quantity <= Decimal::ZERO {
            return Err(DomainError::InvalidRecipe {
                recipe_id: recipe.id,
                reason: format!("yield quantity must be positive, got {}", recipe.yield_quantity),
            }
            .into());
        }

        let mut lines = Vec::new();
        for row in self.fetch_recipe_lines(recipe.id).await? {
            let Some(ingredient_name) = row.ingredient_name else {
                return Err(DomainError::InvalidRecipe {
                    recipe_id: recipe.id,
                    reason: format!("ingredient {} is missing or inactive", row.ingredient_id),
                }
                .into());
            };
            lines.push(RecipeLine {
                ingredient_id: row.ingredient_id,
                ingredient_name,
                quantity_needed: row.quantity_needed,
                unit: row.unit,
            });
        }

        Ok(Some(RecipeInfo {
            recipe_id: recipe.id,
            product_id: recipe.product_id,
            production_location: recipe.production_location,
            yield_quantity: recipe.yield_quantity,
            lines,
        }))
    }
}

/// Recipe service for managing bills of materials
#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
}

/// Input for creating or replacing a product's recipe
#[derive(Debug, Deserialize, Validate)]
pub struct SaveRecipeInput {
    pub product_id: Uuid,
    pub yield_quantity: Decimal,
    pub production_location: StockLocation,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "Recipe must have at least one ingredient"))]
    pub ingredients: Vec<RecipeIngredientInput>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RecipeIngredientInput {
    pub ingredient_id: Uuid,
    pub quantity_needed: Decimal,
    pub unit: String,
}

/// A recipe with its ingredient lines
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub lines: Vec<RecipeLine>,
}

impl RecipeService {
    /// Create a new RecipeService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the recipe for a finished product, or replace the existing one
    pub async fn save_recipe(&self, input: SaveRecipeInput) -> AppResult<RecipeDetail> {
        input.validate()?;

        let pairs: Vec<(Uuid, Decimal)> = input
            .ingredients
            .iter()
            .map(|i| (i.ingredient_id, i.quantity_needed))
            .collect();
        shared::validate_recipe(input.product_id, input.yield_quantity, &pairs)
            .map_err(|msg| AppError::validation("ingredients", msg))?;

        let mut tx = self.db.begin().await?;

        // Validate the product exists and is a finished good
        let product_type = sqlx::query_scalar::<_, String>(
            "SELECT product_type FROM products WHERE id = $1 AND is_active",
        )
        .bind(input.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        if ProductType::parse(&product_type) != Some(ProductType::Finished) {
            return Err(AppError::validation(
                "product_id",
                "Recipes can only be attached to finished products",
            ));
        }

        // Validate every ingredient exists and is active
        let ingredient_ids: Vec<Uuid> = pairs.iter().map(|(id, _)| *id).collect();
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE id = ANY($1) AND is_active",
        )
        .bind(&ingredient_ids[..])
        .fetch_one(&mut *tx)
        .await?;

        if found != ingredient_ids.len() as i64 {
            return Err(AppError::validation(
                "ingredients",
                "One or more ingredients do not exist or are inactive",
            ));
        }

        let sql = format!(
            r#"
            INSERT INTO recipes (product_id, yield_quantity, production_location, notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id) DO UPDATE
            SET yield_quantity = EXCLUDED.yield_quantity,
                production_location = EXCLUDED.production_location,
                notes = EXCLUDED.notes,
                updated_at = NOW()
            RETURNING {}
            "#,
            RECIPE_COLUMNS
        );
        let recipe: Recipe = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(input.product_id)
            .bind(input.yield_quantity)
            .bind(input.production_location.as_str())
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe.id)
            .execute(&mut *tx)
            .await?;

        for (position, ingredient) in input.ingredients.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity_needed, unit, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(recipe.id)
            .bind(ingredient.ingredient_id)
            .bind(ingredient.quantity_needed)
            .bind(&ingredient.unit)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        let detail = load_detail(&mut PgStore::new(&mut tx), recipe).await?;

        tx.commit().await?;

        tracing::info!(
            recipe_id = %detail.recipe.id,
            product_id = %detail.recipe.product_id,
            ingredients = detail.lines.len(),
            "Recipe saved"
        );

        Ok(detail)
    }

    /// Get the recipe of a finished product
    pub async fn get_recipe(&self, product_id: Uuid) -> AppResult<RecipeDetail> {
        let mut conn = self.db.acquire().await?;
        let mut store = PgStore::new(&mut conn);

        let recipe = store
            .fetch_recipe(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        load_detail(&mut store, recipe).await
    }

    /// Delete a recipe unless an open order still needs it
    pub async fn delete_recipe(&self, product_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let in_use = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM order_items oi
                JOIN orders o ON o.id = oi.order_id
                WHERE oi.product_id = $1 AND o.status IN ('pending', 'in_production')
            )
            "#,
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        if in_use {
            return Err(AppError::Conflict {
                resource: "recipe".to_string(),
                message: "Recipe is referenced by pending orders".to_string(),
            });
        }

        let result = sqlx::query("DELETE FROM recipes WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Recipe".to_string()));
        }

        tx.commit().await?;

        tracing::info!(product_id = %product_id, "Recipe deleted");
        Ok(())
    }
}

/// Attach ingredient lines to a recipe, including ones whose product is gone
async fn load_detail(store: &mut PgStore<'_>, recipe: Recipe) -> AppResult<RecipeDetail> {
    let lines = store
        .fetch_recipe_lines(recipe.id)
        .await?
        .into_iter()
        .map(|row| RecipeLine {
            ingredient_id: row.ingredient_id,
            ingredient_name: row
                .ingredient_name
                .unwrap_or_else(|| "(inactive ingredient)".to_string()),
            quantity_needed: row.quantity_needed,
            unit: row.unit,
        })
        .collect();

    Ok(RecipeDetail { recipe, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::MemoryStore;

    #[tokio::test]
    async fn test_product_without_recipe_resolves_to_none() {
        let mut store = MemoryStore::default();
        assert_eq!(store.resolve(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_inactive_ingredient_is_invalid_recipe() {
        let bread = Uuid::new_v4();
        let flour = Uuid::new_v4();
        let mut store = MemoryStore::default()
            .with_recipe(MemoryStore::single_line_recipe(bread, flour, 500, 1))
            .with_inactive(flour);

        let err = store.resolve(bread).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRecipe(_)));
    }

    #[test]
    fn test_save_input_requires_ingredients() {
        let input = SaveRecipeInput {
            product_id: Uuid::new_v4(),
            yield_quantity: Decimal::from(12),
            production_location: StockLocation::Warehouse,
            notes: None,
            ingredients: vec![],
        };
        assert!(input.validate().is_err());
    }
}
