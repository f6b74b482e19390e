//! Contact form submission

use axum::{Json, extract::State};
use shared::error::AppError;

use super::ApiResult;
use crate::email::{ContactForm, Delivered};
use crate::state::AppState;

/// POST /api/contact
///
/// Delivery is the whole operation here, so a delivery failure is the
/// response (with the manual fallback text attached).
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(form): Json<ContactForm>,
) -> ApiResult<Delivered> {
    for (field, value) in [
        ("full_name", &form.full_name),
        ("email", &form.email),
        ("subject", &form.subject),
        ("message", &form.message),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::required(field));
        }
    }
    if !form.email.contains('@') {
        return Err(AppError::validation("A valid email address is required"));
    }

    let delivered = state.notifier.send_contact_form(form).await?;
    Ok(Json(delivered))
}
