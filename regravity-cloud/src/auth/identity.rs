//! Bearer JWT authentication against the hosted identity provider

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::UserRole;

use crate::db::OrderScope;
use crate::state::AppState;

/// Role hint set by the identity provider
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    pub role: Option<String>,
}

/// Claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub email: Option<String>,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

/// Authenticated caller extracted from the JWT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Orders this caller may read
    pub fn order_scope(&self) -> OrderScope {
        match self.role {
            UserRole::Admin => OrderScope::All,
            UserRole::Supplier => OrderScope::Supplier(self.user_id.clone()),
            UserRole::Buyer => OrderScope::Buyer(self.user_id.clone()),
        }
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        let role = claims
            .app_metadata
            .role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or_default();
        Self {
            user_id: claims.sub,
            email: claims.email.unwrap_or_default(),
            role,
        }
    }
}

pub fn require_admin(identity: &Identity) -> Result<(), AppError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::AdminRequired))
    }
}

/// Decode and validate an HS256 token
pub fn decode_token(token: &str, secret: &str) -> Result<Identity, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Provider tokens carry aud = "authenticated"
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::new(ErrorCode::TokenExpired)
            }
            _ => AppError::new(ErrorCode::TokenInvalid),
        }
    })?;

    Ok(data.claims.into())
}

/// Middleware that verifies the bearer token and inserts [`Identity`]
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::not_authenticated().into_response())?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::with_message(ErrorCode::TokenInvalid, "Invalid Authorization format")
            .into_response()
    })?;

    let identity = decode_token(token, &state.jwt_secret).map_err(IntoResponse::into_response)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Sign a token the way the identity provider does
#[cfg(test)]
pub fn create_token(user_id: &str, email: &str, role: Option<&str>, secret: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header};

    let claims = Claims {
        sub: user_id.to_string(),
        email: Some(email.to_string()),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        app_metadata: AppMetadata {
            role: role.map(str::to_string),
        },
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode test token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_roles() {
        let token = create_token("u-1", "a@b.co", Some("admin"), "secret");
        let identity = decode_token(&token, "secret").unwrap();
        assert_eq!(identity.user_id, "u-1");
        assert_eq!(identity.email, "a@b.co");
        assert!(identity.is_admin());

        let token = create_token("u-2", "c@d.co", None, "secret");
        assert_eq!(decode_token(&token, "secret").unwrap().role, UserRole::Buyer);

        let token = create_token("u-3", "e@f.co", Some("superuser"), "secret");
        assert_eq!(decode_token(&token, "secret").unwrap().role, UserRole::Buyer);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("u-1", "a@b.co", None, "secret");
        let err = decode_token(&token, "other").unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }

    #[test]
    fn test_require_admin() {
        let identity = Identity {
            user_id: "u".into(),
            email: "u@x.co".into(),
            role: UserRole::Supplier,
        };
        assert_eq!(
            require_admin(&identity).unwrap_err().code,
            ErrorCode::AdminRequired
        );
    }
}
