//! Trade orders and their change requests (authenticated)

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use shared::error::AppError;
use shared::models::{Order, OrderCreate, OrderRequest, OrderRequestCreate};

use super::ApiResult;
use crate::auth::Identity;
use crate::orders::ChangeRequestOutcome;
use crate::state::AppState;

/// POST /api/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(input): Json<OrderCreate>,
) -> ApiResult<Order> {
    let order = state
        .orders
        .create_order(&identity, input)
        .await
        .map_err(AppError::from)?;
    Ok(Json(order))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Order>> {
    let orders = state
        .orders
        .list_orders(&identity)
        .await
        .map_err(AppError::from)?;
    Ok(Json(orders))
}

/// GET /api/orders/{order_id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<String>,
) -> ApiResult<Order> {
    let order = state
        .orders
        .get_order(&identity, &order_id)
        .await
        .map_err(AppError::from)?;
    Ok(Json(order))
}

/// POST /api/orders/{order_id}/requests
pub async fn create_change_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<String>,
    Json(input): Json<OrderRequestCreate>,
) -> ApiResult<ChangeRequestOutcome> {
    let outcome = state
        .orders
        .create_change_request(&identity, &order_id, input)
        .await
        .map_err(AppError::from)?;
    Ok(Json(outcome))
}

/// GET /api/orders/{order_id}/requests
pub async fn list_change_requests(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<String>,
) -> ApiResult<Vec<OrderRequest>> {
    let requests = state
        .orders
        .list_change_requests(&identity, &order_id)
        .await
        .map_err(AppError::from)?;
    Ok(Json(requests))
}
