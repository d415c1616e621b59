//! Route definitions for the Bakery Back-Office

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes; everything under them requires a bearer token
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/orders", order_routes())
        .nest("/stock", stock_routes())
        .nest("/recipes", recipe_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Order routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_order))
        .route("/availability", post(handlers::check_availability))
        .route("/:id", get(handlers::get_order))
        .route("/:id/status", post(handlers::change_order_status))
}

/// Stock ledger routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/adjust", post(handlers::adjust_stock))
        .route("/transfer", post(handlers::transfer_stock))
        .route("/minimum", post(handlers::set_minimum_stock))
        .route("/low", get(handlers::low_stock_report))
        .route("/:product_id", get(handlers::get_stock))
        .route("/:product_id/movements", get(handlers::list_movements))
}

/// Recipe routes
fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::save_recipe))
        .route(
            "/:product_id",
            get(handlers::get_recipe).delete(handlers::delete_recipe),
        )
}
