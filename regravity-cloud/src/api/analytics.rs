//! Dashboard analytics (authenticated)

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use shared::util::now_millis;

use super::ApiResult;
use crate::analytics::{AnalyticsQuery, AnalyticsSnapshot, compute_analytics};
use crate::auth::{Identity, require_admin};
use crate::state::AppState;

/// GET /api/analytics - scoped to the caller's own orders
pub async fn my_analytics(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<AnalyticsSnapshot> {
    let snapshot = compute_analytics(state.repo.as_ref(), &query, &identity, now_millis()).await;
    Ok(Json(snapshot))
}

/// GET /api/admin/analytics - every user and order
pub async fn admin_analytics(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<AnalyticsSnapshot> {
    require_admin(&identity)?;
    let snapshot = compute_analytics(state.repo.as_ref(), &query, &identity, now_millis()).await;
    Ok(Json(snapshot))
}
