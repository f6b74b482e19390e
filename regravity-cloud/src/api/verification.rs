//! Verification code endpoints (public, rate limited)

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use shared::models::VerificationPurpose;

use super::ApiResult;
use crate::state::AppState;
use crate::verification::IssuedChallenge;

#[derive(Deserialize)]
pub struct SendCodeRequest {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub purpose: VerificationPurpose,
}

/// POST /api/verification/send
pub async fn send_code(
    State(state): State<AppState>,
    Json(req): Json<SendCodeRequest>,
) -> ApiResult<IssuedChallenge> {
    let issued = state
        .verification
        .issue(&req.email, &req.display_name, req.purpose)
        .await?;
    Ok(Json(issued))
}

/// POST /api/verification/resend
pub async fn resend_code(
    State(state): State<AppState>,
    Json(req): Json<SendCodeRequest>,
) -> ApiResult<IssuedChallenge> {
    let issued = state
        .verification
        .resend(&req.email, &req.display_name, req.purpose)
        .await?;
    Ok(Json(issued))
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub purpose: VerificationPurpose,
    pub code: String,
}

#[derive(Serialize)]
pub struct VerifyCodeResponse {
    pub verified: bool,
}

/// POST /api/verification/verify
pub async fn verify_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> ApiResult<VerifyCodeResponse> {
    state.verification.verify(&req.email, req.purpose, &req.code)?;
    Ok(Json(VerifyCodeResponse { verified: true }))
}
