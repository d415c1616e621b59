//! HTTP handlers for order endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{AvailabilityReport, Order};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::order::{
    AvailabilityInput, ChangeStatusInput, CreateOrderInput, CreatedOrder, StatusChange,
};
use crate::services::OrderService;
use crate::AppState;

/// Create a customer order or counter production request
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<CreatedOrder>)> {
    check_permission(&current_user.0, "orders", "write")?;

    let service = OrderService::new(state.db);
    let created = service.create_order(current_user.0.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get an order with its lines
pub async fn get_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(state.db);
    let order = service.get_order(order_id).await?;
    Ok(Json(order))
}

/// Advisory availability check; never changes stock
pub async fn check_availability(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<AvailabilityInput>,
) -> AppResult<Json<AvailabilityReport>> {
    let service = OrderService::new(state.db);
    let report = service.check_availability(input).await?;
    Ok(Json(report))
}

/// Move an order to a new status
pub async fn change_order_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<ChangeStatusInput>,
) -> AppResult<Json<StatusChange>> {
    check_permission(&current_user.0, "orders", "transition")?;

    let service = OrderService::new(state.db);
    let change = service
        .change_status(order_id, input.status, current_user.0.actor())
        .await?;
    Ok(Json(change))
}
