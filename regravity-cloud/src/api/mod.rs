//! API routes for regravity-cloud

pub mod analytics;
pub mod contact;
pub mod health;
pub mod invitations;
pub mod orders;
pub mod registration;
pub mod service_orders;
pub mod verification;

use axum::routing::{get, post};
use axum::{Router, middleware};
use http::{HeaderName, HeaderValue};
use shared::error::AppError;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::identity::identity_middleware;
use crate::auth::rate_limit::{
    contact_rate_limit, invitation_rate_limit, registration_rate_limit, verification_rate_limit,
};
use crate::state::AppState;

pub type ApiResult<T> = Result<axum::Json<T>, AppError>;

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Verification codes (public, 5/min per IP and per address)
    let verification = Router::new()
        .route("/api/verification/send", post(verification::send_code))
        .route("/api/verification/resend", post(verification::resend_code))
        .route("/api/verification/verify", post(verification::verify_code))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            verification_rate_limit,
        ));

    // Contact form (public, 3/min per IP)
    let contact = Router::new()
        .route("/api/contact", post(contact::submit_contact))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            contact_rate_limit,
        ));

    // Welcome notice after sign-up (public, never fails, 5/min per IP, 2/min per address)
    let registration = Router::new()
        .route(
            "/api/registrations/notify",
            post(registration::notify_registration),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            registration_rate_limit,
        ));

    // Invitations (JWT, 10/min per IP, 3/min per recipient)
    let invitations = Router::new()
        .route("/api/invitations/buyer", post(invitations::invite_buyer))
        .route("/api/invitations/supplier", post(invitations::invite_supplier))
        .route("/api/invitations/user", post(invitations::invite_user))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            invitation_rate_limit,
        ));

    // Orders, service orders, analytics (JWT)
    let authenticated = Router::new()
        .route(
            "/api/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route("/api/orders/{order_id}", get(orders::get_order))
        .route(
            "/api/orders/{order_id}/requests",
            post(orders::create_change_request).get(orders::list_change_requests),
        )
        .route(
            "/api/service-orders",
            post(service_orders::create_service_order).get(service_orders::list_service_orders),
        )
        .route("/api/analytics", get(analytics::my_analytics))
        .route("/api/admin/analytics", get(analytics::admin_analytics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(verification)
        .merge(contact)
        .merge(registration)
        .merge(invitations)
        .merge(authenticated)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        // Added last so it runs first: Set assigns the id, Propagate copies it to the response
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            XRequestId,
        ))
        .with_state(state)
}
