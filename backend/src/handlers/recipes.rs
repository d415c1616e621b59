//! HTTP handlers for recipe endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::recipe::{RecipeDetail, SaveRecipeInput};
use crate::services::RecipeService;
use crate::AppState;

/// Create or replace the recipe of a finished product
pub async fn save_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SaveRecipeInput>,
) -> AppResult<Json<RecipeDetail>> {
    check_permission(&current_user.0, "recipes", "write")?;

    let service = RecipeService::new(state.db);
    let recipe = service.save_recipe(input).await?;
    Ok(Json(recipe))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<RecipeDetail>> {
    let service = RecipeService::new(state.db);
    let recipe = service.get_recipe(product_id).await?;
    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&current_user.0, "recipes", "write")?;

    let service = RecipeService::new(state.db);
    service.delete_recipe(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
