//! Fixed-window limits for the routes that send email
//!
//! Every [`Policy`] counts requests per client IP. Policies that name a
//! recipient field also count per recipient address, so a caller rotating
//! IPs still cannot flood one inbox.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use shared::error::{AppError, ErrorCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::state::AppState;

/// Windows untouched this long are dropped by [`RateLimiter::cleanup`]
const STALE_AFTER: Duration = Duration::from_secs(300);
/// Bodies on limited routes are small JSON forms
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug)]
pub struct Policy {
    pub name: &'static str,
    pub per_ip: u32,
    /// JSON fields that may hold the recipient; the first string found counts
    pub recipient_fields: &'static [&'static str],
    pub per_recipient: u32,
    pub window: Duration,
}

pub static VERIFICATION: Policy = Policy {
    name: "verification",
    per_ip: 5,
    recipient_fields: &["email"],
    per_recipient: 5,
    window: Duration::from_secs(60),
};

/// Mail goes to the operations inbox, so only the sender IP is counted
pub static CONTACT: Policy = Policy {
    name: "contact",
    per_ip: 3,
    recipient_fields: &[],
    per_recipient: 0,
    window: Duration::from_secs(60),
};

pub static REGISTRATION: Policy = Policy {
    name: "registration",
    per_ip: 5,
    recipient_fields: &["email"],
    per_recipient: 2,
    window: Duration::from_secs(60),
};

pub static INVITATIONS: Policy = Policy {
    name: "invitations",
    per_ip: 10,
    recipient_fields: &["recipient_email", "email"],
    per_recipient: 3,
    window: Duration::from_secs(60),
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Subject {
    Ip(String),
    Recipient(String),
}

struct Window {
    count: u32,
    started: Instant,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<DashMap<(&'static str, Subject), Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request; `false` once `max` is exceeded within the window
    fn hit(&self, policy: &Policy, subject: Subject, max: u32) -> bool {
        let now = Instant::now();
        let mut window = self
            .windows
            .entry((policy.name, subject))
            .or_insert_with(|| Window {
                count: 0,
                started: now,
            });
        if now.duration_since(window.started) >= policy.window {
            window.count = 0;
            window.started = now;
        }
        window.count += 1;
        window.count <= max
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < STALE_AFTER);
    }
}

/// X-Forwarded-For (first hop) behind the load balancer, else the peer address
fn client_ip(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_owned();
    }
    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Normalized recipient address named by the JSON body, if any
fn recipient_of(body: &Bytes, fields: &[&str]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    fields
        .iter()
        .filter_map(|field| value.get(*field)?.as_str())
        .map(|email| email.trim().to_lowercase())
        .find(|email| !email.is_empty())
}

fn refused(policy: &Policy) -> Response {
    let secs = policy.window.as_secs();
    AppError::too_many_requests()
        .with_detail("retry_after_secs", secs)
        .into_response()
}

async fn enforce(
    state: &AppState,
    policy: &'static Policy,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = client_ip(&request);
    if !state
        .rate_limiter
        .hit(policy, Subject::Ip(ip.clone()), policy.per_ip)
    {
        tracing::warn!(route = policy.name, ip = %ip, "Rate limited by client IP");
        return Err(refused(policy));
    }

    if policy.recipient_fields.is_empty() {
        return Ok(next.run(request).await);
    }

    // Buffer the body to read the recipient, then hand it on untouched
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| {
            AppError::with_message(ErrorCode::InvalidRequest, "Request body too large")
                .into_response()
        })?;
    if let Some(recipient) = recipient_of(&bytes, policy.recipient_fields)
        && !state.rate_limiter.hit(
            policy,
            Subject::Recipient(recipient.clone()),
            policy.per_recipient,
        )
    {
        tracing::warn!(route = policy.name, recipient = %recipient, "Rate limited by recipient");
        return Err(refused(policy));
    }
    Ok(next
        .run(Request::from_parts(parts, Body::from(bytes)))
        .await)
}

/// Verification send/resend/verify
pub async fn verification_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, &VERIFICATION, request, next).await
}

pub async fn contact_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, &CONTACT, request, next).await
}

/// Welcome notices after sign-up
pub async fn registration_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, &REGISTRATION, request, next).await
}

pub async fn invitation_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, &INVITATIONS, request, next).await
}
