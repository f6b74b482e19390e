//! Post-registration welcome notice

use axum::{Json, extract::State};

use super::ApiResult;
use crate::email::{Registration, RegistrationNotice};
use crate::state::AppState;

/// POST /api/registrations/notify
///
/// Always 200: the outcome is reported in the body so sign-up never blocks
/// on email.
pub async fn notify_registration(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> ApiResult<RegistrationNotice> {
    let email = registration.email.clone();
    let notice = state.notifier.send_registration_notification(registration).await;
    if let Some(error) = &notice.error {
        tracing::warn!(email = %email, error = %error, "Registration notice not delivered");
    }
    Ok(Json(notice))
}
