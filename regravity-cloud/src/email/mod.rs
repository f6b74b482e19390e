//! Notification dispatcher
//!
//! Every logical notification is delivered by trying its strategy table
//! (see [`notification`]) in order through an [`EmailTransport`]. When all
//! strategies fail the caller gets a [`DispatchFailure`] carrying the last
//! error and a manual fallback text for hand delivery.

pub mod emailjs;
pub mod fallback_text;
pub mod links;
pub mod notification;

use async_trait::async_trait;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, ServiceOrder, VerificationPurpose};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::fallback::{Step, first_success};

pub use fallback_text::manual_fallback_text;
pub use notification::{
    ChangeRequestNotice, ContactForm, Invitation, Notification, Registration, Routing,
    UserInvitation,
};

/// The two hosted templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    General,
    Verification,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Verification => "verification",
        }
    }
}

/// Flat named string parameters for a template
pub type TemplateParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    /// Provider refuses this kind of caller or content
    ProviderPolicy,
    /// Rate limit or missing/invalid parameters
    PreconditionRejected,
    Network,
    Generic,
}

impl DeliveryErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderPolicy => "provider_policy",
            Self::PreconditionRejected => "precondition_rejected",
            Self::Network => "network",
            Self::Generic => "generic",
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ProviderPolicy => ErrorCode::DeliveryProviderPolicy,
            Self::PreconditionRejected => ErrorCode::DeliveryPreconditionRejected,
            Self::Network => ErrorCode::DeliveryNetwork,
            Self::Generic => ErrorCode::DeliveryFailed,
        }
    }
}

impl fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub message: String,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Hosted transactional email collaborator
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, template: TemplateKind, params: &TemplateParams)
    -> Result<(), DeliveryError>;
}

/// A successful delivery: which strategy got through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delivered {
    pub notification: &'static str,
    /// Label of the strategy that succeeded (`deliveryMethod`)
    pub delivery_method: &'static str,
}

/// Result of `send_verification_code`
#[derive(Debug, Clone)]
pub struct CodeDelivery {
    pub code: String,
    pub delivery_method: &'static str,
}

/// Outcome of the non-blocking registration notice
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationNotice {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every strategy for a notification failed
#[derive(Debug, Clone, thiserror::Error)]
#[error("{notification} not delivered after {attempts} attempt(s): {last}")]
pub struct DispatchFailure {
    pub notification: &'static str,
    pub attempts: usize,
    /// Most recent strategy error, verbatim
    pub last: DeliveryError,
    pub classified: bool,
    pub secret: bool,
    pub manual_fallback: String,
}

impl From<DispatchFailure> for AppError {
    fn from(f: DispatchFailure) -> Self {
        let code = if f.classified {
            f.last.kind.error_code()
        } else {
            ErrorCode::DeliveryFailed
        };
        let mut err = AppError::with_message(code, f.last.message)
            .with_detail("notification", f.notification)
            .with_detail("attempts", f.attempts);
        if f.classified {
            err = err.with_detail("failure_kind", f.last.kind.as_str());
        }
        if !f.secret {
            err = err.with_detail("manual_fallback", f.manual_fallback);
        }
        err
    }
}

type CodeSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Dispatcher over one transport
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn EmailTransport>,
    routing: Arc<Routing>,
    code_source: CodeSource,
}

impl Notifier {
    pub fn new(transport: Arc<dyn EmailTransport>, config: &Config) -> Self {
        Self {
            transport,
            routing: Arc::new(Routing {
                admin_email: config.admin_email.clone(),
                support_email: config.support_email.clone(),
                operations_email: config.operations_email.clone(),
                site_url: config.site_url.clone(),
            }),
            code_source: Arc::new(shared::util::generate_code),
        }
    }

    /// Replace the verification code generator
    #[cfg(test)]
    pub fn with_code_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.code_source = Arc::new(source);
        self
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    pub fn manual_fallback_text(&self, notification: &Notification) -> String {
        manual_fallback_text(notification, &self.routing)
    }

    /// Try each strategy of `notification` in order until one is accepted
    pub async fn dispatch(&self, notification: &Notification) -> Result<Delivered, DispatchFailure> {
        let kind = notification.kind();
        let steps = notification
            .strategies(&self.routing)
            .into_iter()
            .map(|strategy| {
                let transport = self.transport.clone();
                Step::new(strategy.label, move || async move {
                    transport.send(strategy.template, &strategy.params).await
                })
            })
            .collect();

        match first_success(kind, steps).await {
            Ok(ok) => Ok(Delivered {
                notification: kind,
                delivery_method: ok.label,
            }),
            Err(exhausted) => {
                let attempts = exhausted.attempts.len();
                let last = exhausted.into_last().map(|a| a.error).unwrap_or_else(|| {
                    DeliveryError::new(DeliveryErrorKind::Generic, "no delivery strategy")
                });
                tracing::error!(
                    notification = kind,
                    attempts,
                    error = %last,
                    "All delivery strategies failed"
                );
                Err(DispatchFailure {
                    notification: kind,
                    attempts,
                    last,
                    classified: notification.classifies_failure(),
                    secret: notification.is_secret(),
                    manual_fallback: self.manual_fallback_text(notification),
                })
            }
        }
    }

    /// Generate a fresh code, then deliver it. The code exists before any
    /// delivery attempt.
    pub async fn send_verification_code(
        &self,
        email: &str,
        display_name: &str,
        purpose: VerificationPurpose,
    ) -> Result<CodeDelivery, DispatchFailure> {
        let code = (self.code_source)();
        let notification = Notification::VerificationCode {
            email: email.to_string(),
            display_name: display_name.to_string(),
            purpose,
            code: code.clone(),
        };
        let delivered = self.dispatch(&notification).await?;
        Ok(CodeDelivery {
            code,
            delivery_method: delivered.delivery_method,
        })
    }

    pub async fn send_contact_form(&self, form: ContactForm) -> Result<Delivered, DispatchFailure> {
        self.dispatch(&Notification::ContactForm(form)).await
    }

    pub async fn send_order_notification(&self, order: &Order) -> Result<Delivered, DispatchFailure> {
        self.dispatch(&Notification::OrderCreated(Box::new(order.clone())))
            .await
    }

    pub async fn send_service_order_notification(
        &self,
        order: &ServiceOrder,
    ) -> Result<Delivered, DispatchFailure> {
        self.dispatch(&Notification::ServiceOrderCreated(Box::new(order.clone())))
            .await
    }

    /// Invite the (unregistered) supplier named on `order`
    pub async fn send_supplier_invite(&self, order: &Order) -> Result<Delivered, DispatchFailure> {
        let notification = Notification::SupplierInvite {
            supplier_email: order.supplier_email.clone().unwrap_or_default(),
            order: Box::new(order.clone()),
        };
        if order.supplier_email.as_deref().is_none_or(str::is_empty) {
            return Err(DispatchFailure {
                notification: notification.kind(),
                attempts: 0,
                last: DeliveryError::new(
                    DeliveryErrorKind::PreconditionRejected,
                    "order has no supplier email",
                ),
                classified: false,
                secret: false,
                manual_fallback: self.manual_fallback_text(&notification),
            });
        }
        self.dispatch(&notification).await
    }

    pub async fn send_buyer_invitation(
        &self,
        invitation: Invitation,
    ) -> Result<Delivered, DispatchFailure> {
        self.dispatch(&Notification::BuyerInvitation(invitation)).await
    }

    pub async fn send_supplier_invitation_from_dashboard(
        &self,
        invitation: Invitation,
    ) -> Result<Delivered, DispatchFailure> {
        self.dispatch(&Notification::SupplierInvitation(invitation))
            .await
    }

    pub async fn send_user_invitation(
        &self,
        invitation: UserInvitation,
    ) -> Result<Delivered, DispatchFailure> {
        self.dispatch(&Notification::UserInvitation(invitation)).await
    }

    /// Never fails: registration must not be blocked by email trouble
    pub async fn send_registration_notification(
        &self,
        registration: Registration,
    ) -> RegistrationNotice {
        match self
            .dispatch(&Notification::RegistrationWelcome(registration))
            .await
        {
            Ok(_) => RegistrationNotice {
                success: true,
                error: None,
            },
            Err(failure) => RegistrationNotice {
                success: false,
                error: Some(failure.last.message),
            },
        }
    }

    /// Structured change request summary for the admin
    pub async fn notify_change_request(
        &self,
        notice: ChangeRequestNotice,
    ) -> Result<Delivered, DispatchFailure> {
        self.dispatch(&Notification::ChangeRequest(notice)).await
    }

    /// "Storage failed, process manually" notice carrying the full request
    pub async fn send_manual_processing(
        &self,
        notice: ChangeRequestNotice,
    ) -> Result<Delivered, DispatchFailure> {
        self.dispatch(&Notification::ManualProcessing(notice)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, sample_order};

    fn notifier(transport: &Arc<MockTransport>) -> Notifier {
        Notifier::new(transport.clone(), &Config::for_tests()).with_code_source(|| "042137".into())
    }

    #[tokio::test]
    async fn test_second_strategy_success_skips_third() {
        let transport = Arc::new(MockTransport::scripted([false, true, true]));
        let notifier = notifier(&transport);

        let delivery = notifier
            .send_verification_code("ann@acme.test", "Ann", VerificationPurpose::Signup)
            .await
            .unwrap();

        assert_eq!(delivery.code, "042137");
        assert_eq!(delivery.delivery_method, "general_inline");
        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].template, TemplateKind::Verification);
        assert_eq!(calls[1].template, TemplateKind::General);
    }

    #[tokio::test]
    async fn test_exhausted_verification_is_classified_and_secret() {
        let transport = Arc::new(MockTransport::failing(DeliveryError::new(
            DeliveryErrorKind::ProviderPolicy,
            "API calls are disabled for non-browser applications",
        )));
        let notifier = notifier(&transport);

        let failure = notifier
            .send_verification_code("ann@acme.test", "Ann", VerificationPurpose::Login)
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert!(failure.manual_fallback.contains("042137"));

        let err: AppError = failure.into();
        assert_eq!(err.code, ErrorCode::DeliveryProviderPolicy);
        assert_eq!(
            err.message,
            "API calls are disabled for non-browser applications"
        );
        let details = err.details.unwrap();
        assert!(!details.contains_key("manual_fallback"));
        assert_eq!(details["failure_kind"], "provider_policy");
    }

    #[tokio::test]
    async fn test_contact_form_failure_surfaces_last_error_and_fallback() {
        let transport = Arc::new(MockTransport::failing_with_messages([
            "first", "second", "third",
        ]));
        let notifier = notifier(&transport);

        let err: AppError = notifier
            .send_contact_form(ContactForm {
                full_name: "Ann Lee".into(),
                email: "ann@acme.test".into(),
                subject: "Pricing".into(),
                message: "How much is inspection?".into(),
            })
            .await
            .unwrap_err()
            .into();

        assert_eq!(err.code, ErrorCode::DeliveryFailed);
        assert_eq!(err.message, "third");
        let fallback = err.details.unwrap()["manual_fallback"].clone();
        assert!(fallback.as_str().unwrap().contains("How much is inspection?"));
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_registration_notice_never_errors() {
        let transport = Arc::new(MockTransport::failing_with_messages(["down", "still down"]));
        let notifier = notifier(&transport);

        let notice = notifier
            .send_registration_notification(Registration {
                email: "new@acme.test".into(),
                full_name: Some("New".into()),
                company_name: None,
                role: shared::models::UserRole::Buyer,
                public_id: Some("BUYAAAA1111".into()),
            })
            .await;
        assert!(!notice.success);
        assert_eq!(notice.error.as_deref(), Some("still down"));
    }

    #[tokio::test]
    async fn test_supplier_invite_without_email_is_rejected_before_sending() {
        let transport = Arc::new(MockTransport::succeeding());
        let notifier = notifier(&transport);
        let mut order = sample_order();
        order.supplier_email = None;

        let failure = notifier.send_supplier_invite(&order).await.unwrap_err();
        assert_eq!(failure.attempts, 0);
        assert!(transport.calls().is_empty());
    }
}
