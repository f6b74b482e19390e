//! EmailJS integration via REST API (no SDK dependency)

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

use super::{DeliveryError, DeliveryErrorKind, EmailTransport, TemplateKind, TemplateParams};
use crate::config::Config;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken")]
    access_token: &'a str,
    template_params: &'a TemplateParams,
}

/// Sends through the EmailJS `email/send` endpoint
pub struct EmailJsTransport {
    client: reqwest::Client,
    api_url: String,
    service_id: String,
    public_key: String,
    private_key: String,
    general_template_id: String,
    verification_template_id: String,
}

impl EmailJsTransport {
    pub fn new(config: &Config) -> Result<Self, BoxError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_url: config.emailjs_api_url.clone(),
            service_id: config.emailjs_service_id.clone(),
            public_key: config.emailjs_public_key.clone(),
            private_key: config.emailjs_private_key.clone(),
            general_template_id: config.emailjs_general_template_id.clone(),
            verification_template_id: config.emailjs_verification_template_id.clone(),
        })
    }

    fn template_id(&self, template: TemplateKind) -> &str {
        match template {
            TemplateKind::General => &self.general_template_id,
            TemplateKind::Verification => &self.verification_template_id,
        }
    }
}

/// Classify a non-2xx EmailJS response
pub fn classify_response(status: StatusCode, body: &str) -> DeliveryErrorKind {
    let lower = body.to_ascii_lowercase();
    if status == StatusCode::FORBIDDEN
        || lower.contains("non-browser")
        || lower.contains("api calls are disabled")
    {
        DeliveryErrorKind::ProviderPolicy
    } else if status == StatusCode::PRECONDITION_FAILED
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::UNPROCESSABLE_ENTITY
    {
        DeliveryErrorKind::PreconditionRejected
    } else if status.is_server_error() {
        DeliveryErrorKind::Network
    } else {
        DeliveryErrorKind::Generic
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() || e.is_connect() || e.is_request() {
            DeliveryErrorKind::Network
        } else {
            DeliveryErrorKind::Generic
        };
        DeliveryError::new(kind, e.to_string())
    }
}

#[async_trait]
impl EmailTransport for EmailJsTransport {
    async fn send(
        &self,
        template: TemplateKind,
        params: &TemplateParams,
    ) -> Result<(), DeliveryError> {
        let body = SendRequest {
            service_id: &self.service_id,
            template_id: self.template_id(template),
            user_id: &self.public_key,
            access_token: &self.private_key,
            template_params: params,
        };

        let resp = self.client.post(&self.api_url).json(&body).send().await?;
        let status = resp.status();
        if status.is_success() {
            tracing::info!(
                to = params.get("to_email").map(String::as_str).unwrap_or(""),
                template = template.as_str(),
                "Email sent"
            );
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        Err(DeliveryError::new(
            classify_response(status, &text),
            format!("EmailJS returned {status}: {text}"),
        ))
    }
}
