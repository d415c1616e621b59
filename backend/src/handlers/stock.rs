//! HTTP handlers for stock endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{LowStockEntry, PaginatedResponse, Pagination, Product, StockMovement};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::ledger::AppliedDelta;
use crate::services::stock::{AdjustStockInput, SetMinimumInput, TransferResult, TransferStockInput};
use crate::services::StockService;
use crate::AppState;

/// Balances and minimums of a product at every location
pub async fn get_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = StockService::new(state.db);
    let product = service.get_stock(product_id).await?;
    Ok(Json(product))
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<AppliedDelta>> {
    check_permission(&current_user.0, "stock", "write")?;

    let service = StockService::new(state.db);
    let applied = service.adjust(current_user.0.actor(), input).await?;
    Ok(Json(applied))
}

pub async fn transfer_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TransferStockInput>,
) -> AppResult<Json<TransferResult>> {
    check_permission(&current_user.0, "stock", "write")?;

    let service = StockService::new(state.db);
    let result = service.transfer(current_user.0.actor(), input).await?;
    Ok(Json(result))
}

pub async fn set_minimum_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SetMinimumInput>,
) -> AppResult<Json<Product>> {
    check_permission(&current_user.0, "stock", "write")?;

    let service = StockService::new(state.db);
    let product = service.set_minimum(input).await?;
    Ok(Json(product))
}

/// Movement history of a product, newest first
pub async fn list_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<StockMovement>>> {
    let service = StockService::new(state.db);
    let movements = service.list_movements(product_id, pagination).await?;
    Ok(Json(movements))
}

pub async fn low_stock_report(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<LowStockEntry>>> {
    let service = StockService::new(state.db);
    let report = service.low_stock_report().await?;
    Ok(Json(report))
}
