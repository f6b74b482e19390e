//! Invitations sent from a dashboard (authenticated, rate limited)

use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use shared::error::AppError;
use shared::models::UserRole;

use super::ApiResult;
use crate::auth::{Identity, require_admin};
use crate::email::{Delivered, Invitation, UserInvitation};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct InviteRequest {
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub message: Option<String>,
}

fn check_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("A valid recipient email is required"));
    }
    Ok(email)
}

/// Sender details plus the sender's public id as referral token
async fn build_invitation(
    state: &AppState,
    identity: &Identity,
    req: InviteRequest,
) -> Result<Invitation, AppError> {
    let recipient_email = check_email(&req.recipient_email)?;
    let profile = state.repo.find_user(&identity.user_id).await.map_err(|e| {
        tracing::error!("Sender lookup failed: {e}");
        AppError::database("Failed to load sender profile")
    })?;

    let (sender_name, referral_code) = match profile {
        Some(p) => (p.display_name().to_string(), p.public_id),
        None => (identity.email.clone(), identity.user_id.clone()),
    };
    Ok(Invitation {
        recipient_email,
        recipient_name: req.recipient_name,
        message: req.message,
        sender_name,
        sender_email: identity.email.clone(),
        referral_code,
    })
}

/// POST /api/invitations/buyer
pub async fn invite_buyer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Delivered> {
    let invitation = build_invitation(&state, &identity, req).await?;
    Ok(Json(state.notifier.send_buyer_invitation(invitation).await?))
}

/// POST /api/invitations/supplier
pub async fn invite_supplier(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Delivered> {
    let invitation = build_invitation(&state, &identity, req).await?;
    Ok(Json(
        state
            .notifier
            .send_supplier_invitation_from_dashboard(invitation)
            .await?,
    ))
}

#[derive(Deserialize)]
pub struct UserInviteRequest {
    pub email: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

/// POST /api/invitations/user (admin only)
pub async fn invite_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UserInviteRequest>,
) -> ApiResult<Delivered> {
    require_admin(&identity)?;
    let invitation = UserInvitation {
        email: check_email(&req.email)?,
        full_name: req.full_name,
        role: req.role,
        invited_by: identity.email.clone(),
        invite_token: uuid::Uuid::new_v4().simple().to_string(),
    };
    Ok(Json(state.notifier.send_user_invitation(invitation).await?))
}
