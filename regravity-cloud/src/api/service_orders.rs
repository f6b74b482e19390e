//! Standalone service orders (authenticated)

use axum::{Extension, Json, extract::State};
use shared::error::AppError;
use shared::models::{ServiceOrder, ServiceOrderCreate};

use super::ApiResult;
use crate::auth::Identity;
use crate::state::AppState;

/// POST /api/service-orders
pub async fn create_service_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(input): Json<ServiceOrderCreate>,
) -> ApiResult<ServiceOrder> {
    let order = state
        .orders
        .create_service_order(&identity, input)
        .await
        .map_err(AppError::from)?;
    Ok(Json(order))
}

/// GET /api/service-orders
pub async fn list_service_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<ServiceOrder>> {
    let orders = state
        .orders
        .list_service_orders(&identity)
        .await
        .map_err(AppError::from)?;
    Ok(Json(orders))
}
