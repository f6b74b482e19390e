//! Notification types and their delivery strategy tables
//!
//! Each notification maps to an ordered list of [`Strategy`] values. A
//! strategy is one template plus one parameter shape; the dispatcher tries
//! them in order. Reordering or adding a strategy is an edit to the table
//! in [`Notification::strategies`], nothing else.

use reqwest::Url;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    Order, RequestType, ServiceId, ServiceOrder, UserRole, VerificationPurpose,
};

use super::links::{LinkToken, dashboard_link, registration_link};
use super::{TemplateKind, TemplateParams};

pub const APP_NAME: &str = "Regravity";

/// Code lifetime as shown in email copy
pub const CODE_TTL_MINUTES: u32 = 10;

/// Where notifications go and what links point at
#[derive(Debug, Clone)]
pub struct Routing {
    pub admin_email: String,
    pub support_email: String,
    pub operations_email: String,
    pub site_url: Url,
}

/// Contact form submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactForm {
    pub full_name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Invitation sent by a logged-in buyer or supplier from their dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub message: Option<String>,
    pub sender_name: String,
    pub sender_email: String,
    /// Sender's public id, carried as the referral token
    pub referral_code: String,
}

/// Admin-issued invitation with a pre-assigned role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInvitation {
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub invited_by: String,
    pub invite_token: String,
}

/// New account details for the welcome email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub role: UserRole,
    pub public_id: Option<String>,
}

impl Registration {
    fn greeting_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.company_name.as_deref())
            .unwrap_or(&self.email)
    }
}

/// Change request summary for the admin inbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequestNotice {
    pub request_id: String,
    pub order_id: String,
    pub request_type: RequestType,
    pub reason: String,
    pub details: Option<String>,
    pub requester_id: String,
    pub requester_email: String,
    /// Where the record ended up (`order_requests table`, `raw sql`), if anywhere
    pub stored_in: Option<String>,
}

/// Every notification the service sends
#[derive(Debug, Clone)]
pub enum Notification {
    VerificationCode {
        email: String,
        display_name: String,
        purpose: VerificationPurpose,
        code: String,
    },
    ContactForm(ContactForm),
    OrderCreated(Box<Order>),
    ServiceOrderCreated(Box<ServiceOrder>),
    SupplierInvite {
        supplier_email: String,
        order: Box<Order>,
    },
    BuyerInvitation(Invitation),
    SupplierInvitation(Invitation),
    UserInvitation(UserInvitation),
    RegistrationWelcome(Registration),
    ChangeRequest(ChangeRequestNotice),
    ManualProcessing(ChangeRequestNotice),
}

/// One template + parameter shape
#[derive(Debug, Clone)]
pub struct Strategy {
    pub label: &'static str,
    pub template: TemplateKind,
    pub params: TemplateParams,
}

impl Strategy {
    fn new<const N: usize>(
        label: &'static str,
        template: TemplateKind,
        pairs: [(&str, String); N],
    ) -> Self {
        Self {
            label,
            template,
            params: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

fn services_summary(order: &Order) -> String {
    let selected: Vec<&str> = order
        .selected_services
        .iter()
        .filter(|(_, on)| **on)
        .map(|(id, _)| id.label())
        .collect();
    if selected.is_empty() {
        "None".to_string()
    } else {
        selected.join(", ")
    }
}

fn service_price(service: ServiceId, cost: Decimal) -> String {
    if service.is_quoted_later() {
        "Quote to follow".to_string()
    } else {
        money(cost)
    }
}

fn or_none(value: Option<&str>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("N/A")
        .to_string()
}

impl Notification {
    /// Stable name used in logs and error details
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VerificationCode { .. } => "verification_code",
            Self::ContactForm(_) => "contact_form",
            Self::OrderCreated(_) => "order_created",
            Self::ServiceOrderCreated(_) => "service_order_created",
            Self::SupplierInvite { .. } => "supplier_invite",
            Self::BuyerInvitation(_) => "buyer_invitation",
            Self::SupplierInvitation(_) => "supplier_invitation",
            Self::UserInvitation(_) => "user_invitation",
            Self::RegistrationWelcome(_) => "registration_welcome",
            Self::ChangeRequest(_) => "change_request",
            Self::ManualProcessing(_) => "manual_processing",
        }
    }

    /// Failures of these are classified (provider policy, precondition,
    /// network) so the caller can pick user-facing copy.
    pub fn classifies_failure(&self) -> bool {
        matches!(self, Self::VerificationCode { .. } | Self::UserInvitation(_))
    }

    /// Content that must never be echoed back to the requester
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::VerificationCode { .. })
    }

    pub fn recipient(&self, routing: &Routing) -> String {
        match self {
            Self::VerificationCode { email, .. } => email.clone(),
            Self::ContactForm(_) => routing.support_email.clone(),
            Self::OrderCreated(_) | Self::ServiceOrderCreated(_) => {
                routing.operations_email.clone()
            }
            Self::SupplierInvite { supplier_email, .. } => supplier_email.clone(),
            Self::BuyerInvitation(inv) | Self::SupplierInvitation(inv) => {
                inv.recipient_email.clone()
            }
            Self::UserInvitation(inv) => inv.email.clone(),
            Self::RegistrationWelcome(reg) => reg.email.clone(),
            Self::ChangeRequest(_) | Self::ManualProcessing(_) => routing.admin_email.clone(),
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Self::VerificationCode { .. } => format!("Your {APP_NAME} verification code"),
            Self::ContactForm(form) => format!("Contact form: {}", form.subject),
            Self::OrderCreated(order) => format!("New order {}", order.order_id),
            Self::ServiceOrderCreated(order) => format!(
                "New service order {} ({})",
                order.order_id,
                order.service_type.label()
            ),
            Self::SupplierInvite { order, .. } => format!(
                "{} has created an order with you on {APP_NAME}",
                order.buyer_company.as_deref().unwrap_or(&order.buyer_email)
            ),
            Self::BuyerInvitation(inv) | Self::SupplierInvitation(inv) => {
                format!("{} invited you to {APP_NAME}", inv.sender_name)
            }
            Self::UserInvitation(_) => format!("You're invited to join {APP_NAME}"),
            Self::RegistrationWelcome(_) => format!("Welcome to {APP_NAME}"),
            Self::ChangeRequest(notice) => format!(
                "{} for order {}",
                notice.request_type.label(),
                notice.order_id
            ),
            Self::ManualProcessing(notice) => format!(
                "[ACTION REQUIRED] Database storage failed, process manually: {} for order {}",
                notice.request_type.label(),
                notice.order_id
            ),
        }
    }

    /// Registration link for invitation-type notifications
    pub fn registration_link(&self, routing: &Routing) -> Option<String> {
        let site = &routing.site_url;
        match self {
            Self::SupplierInvite {
                supplier_email,
                order,
            } => Some(registration_link(
                site,
                UserRole::Supplier,
                LinkToken::Referral(&order.order_id),
                supplier_email,
            )),
            Self::BuyerInvitation(inv) => Some(registration_link(
                site,
                UserRole::Buyer,
                LinkToken::Referral(&inv.referral_code),
                &inv.recipient_email,
            )),
            Self::SupplierInvitation(inv) => Some(registration_link(
                site,
                UserRole::Supplier,
                LinkToken::Referral(&inv.referral_code),
                &inv.recipient_email,
            )),
            Self::UserInvitation(inv) => Some(registration_link(
                site,
                inv.role,
                LinkToken::Invite(&inv.invite_token),
                &inv.email,
            )),
            _ => None,
        }
    }

    /// Ordered delivery strategies for this notification
    pub fn strategies(&self, routing: &Routing) -> Vec<Strategy> {
        use TemplateKind::{General, Verification};

        let to = self.recipient(routing);
        let subject = self.subject();
        let link = self.registration_link(routing).unwrap_or_default();

        match self {
            Self::VerificationCode {
                display_name,
                purpose,
                code,
                ..
            } => vec![
                Strategy::new(
                    "verification_full",
                    Verification,
                    [
                        ("to_email", to.clone()),
                        ("to_name", display_name.clone()),
                        ("passcode", code.clone()),
                        ("purpose", purpose.action().to_string()),
                        ("expires_in", format!("{CODE_TTL_MINUTES} minutes")),
                        ("app_name", APP_NAME.to_string()),
                        ("subject", subject.clone()),
                    ],
                ),
                Strategy::new(
                    "general_inline",
                    General,
                    [
                        ("to_email", to.clone()),
                        ("to_name", display_name.clone()),
                        ("subject", subject),
                        (
                            "message",
                            format!(
                                "Hi {display_name},\n\nYour {APP_NAME} verification code is {code}. \
                                 Use it to {} within {CODE_TTL_MINUTES} minutes.\n\n\
                                 If you did not request this code you can ignore this email.",
                                purpose.action()
                            ),
                        ),
                    ],
                ),
                Strategy::new(
                    "verification_minimal",
                    Verification,
                    [("to_email", to), ("passcode", code.clone())],
                ),
            ],

            Self::ContactForm(form) => vec![
                Strategy::new(
                    "general_structured",
                    General,
                    [
                        ("to_email", to.clone()),
                        ("from_name", form.full_name.clone()),
                        ("from_email", form.email.clone()),
                        ("reply_to", form.email.clone()),
                        ("subject", subject.clone()),
                        ("message", form.message.clone()),
                    ],
                ),
                Strategy::new(
                    "verification_plaintext",
                    Verification,
                    [
                        ("to_email", to.clone()),
                        ("to_name", "Support".to_string()),
                        ("subject", subject),
                        (
                            "message",
                            format!(
                                "Name: {}\nEmail: {}\nSubject: {}\n\n{}",
                                form.full_name, form.email, form.subject, form.message
                            ),
                        ),
                    ],
                ),
                Strategy::new(
                    "general_single_line",
                    General,
                    [
                        ("to_email", to),
                        (
                            "message",
                            format!(
                                "Contact from {} <{}> about \"{}\": {}",
                                form.full_name,
                                form.email,
                                form.subject,
                                form.message.replace('\n', " ")
                            ),
                        ),
                    ],
                ),
            ],

            Self::OrderCreated(order) => vec![
                Strategy::new(
                    "general_structured",
                    General,
                    [
                        ("to_email", to.clone()),
                        ("subject", subject),
                        ("order_id", order.order_id.clone()),
                        ("buyer_email", order.buyer_email.clone()),
                        ("buyer_company", or_none(order.buyer_company.as_deref())),
                        ("supplier_name", order.supplier_name.clone()),
                        ("supplier_email", or_none(order.supplier_email.as_deref())),
                        ("product_description", order.product_description.clone()),
                        ("deal_amount", money(order.deal_amount)),
                        ("services", services_summary(order)),
                        ("service_cost", money(order.service_cost)),
                        ("total_amount", money(order.total_amount)),
                        ("status", order.status.meta().label.to_string()),
                    ],
                ),
                Strategy::new(
                    "general_minimal",
                    General,
                    [
                        ("to_email", to),
                        (
                            "message",
                            format!(
                                "New order {} from {} for {} (total {})",
                                order.order_id,
                                order.buyer_email,
                                order.supplier_name,
                                money(order.total_amount)
                            ),
                        ),
                    ],
                ),
            ],

            Self::ServiceOrderCreated(order) => vec![
                Strategy::new(
                    "general_structured",
                    General,
                    [
                        ("to_email", to.clone()),
                        ("subject", subject),
                        ("order_id", order.order_id.clone()),
                        ("buyer_email", order.buyer_email.clone()),
                        ("buyer_company", or_none(order.buyer_company.as_deref())),
                        ("service", order.service_type.label().to_string()),
                        (
                            "service_details",
                            order
                                .service_details
                                .iter()
                                .map(|(k, v)| format!("{k}: {v}"))
                                .collect::<Vec<_>>()
                                .join("\n"),
                        ),
                        (
                            "service_cost",
                            service_price(order.service_type, order.service_cost),
                        ),
                    ],
                ),
                Strategy::new(
                    "general_minimal",
                    General,
                    [
                        ("to_email", to),
                        (
                            "message",
                            format!(
                                "New {} service order {} from {}",
                                order.service_type.label(),
                                order.order_id,
                                order.buyer_email
                            ),
                        ),
                    ],
                ),
            ],

            Self::SupplierInvite { order, .. } => vec![
                Strategy::new(
                    "general_structured",
                    General,
                    [
                        ("to_email", to.clone()),
                        ("to_name", order.supplier_name.clone()),
                        ("subject", subject.clone()),
                        ("order_id", order.order_id.clone()),
                        ("buyer_company", or_none(order.buyer_company.as_deref())),
                        ("product_description", order.product_description.clone()),
                        ("deal_amount", money(order.deal_amount)),
                        ("registration_link", link.clone()),
                    ],
                ),
                Strategy::new(
                    "general_minimal",
                    General,
                    [
                        ("to_email", to),
                        ("subject", subject),
                        (
                            "message",
                            format!(
                                "You have a new order {} on {APP_NAME}. Register to view it: {link}",
                                order.order_id
                            ),
                        ),
                    ],
                ),
            ],

            Self::BuyerInvitation(inv) | Self::SupplierInvitation(inv) => {
                let role = if matches!(self, Self::BuyerInvitation(_)) {
                    "buyer"
                } else {
                    "supplier"
                };
                vec![
                    Strategy::new(
                        "general_structured",
                        General,
                        [
                            ("to_email", to.clone()),
                            ("to_name", or_none(inv.recipient_name.as_deref())),
                            ("from_name", inv.sender_name.clone()),
                            ("reply_to", inv.sender_email.clone()),
                            ("subject", subject.clone()),
                            ("role", role.to_string()),
                            ("personal_message", or_none(inv.message.as_deref())),
                            ("registration_link", link.clone()),
                        ],
                    ),
                    Strategy::new(
                        "general_minimal",
                        General,
                        [
                            ("to_email", to),
                            ("subject", subject),
                            (
                                "message",
                                format!(
                                    "{} invited you to join {APP_NAME} as a {role}: {link}",
                                    inv.sender_name
                                ),
                            ),
                        ],
                    ),
                ]
            }

            Self::UserInvitation(inv) => vec![
                Strategy::new(
                    "general_structured",
                    General,
                    [
                        ("to_email", to.clone()),
                        ("to_name", or_none(inv.full_name.as_deref())),
                        ("from_name", inv.invited_by.clone()),
                        ("subject", subject.clone()),
                        ("role", inv.role.as_str().to_string()),
                        ("registration_link", link.clone()),
                    ],
                ),
                Strategy::new(
                    "verification_link",
                    Verification,
                    [
                        ("to_email", to.clone()),
                        ("to_name", or_none(inv.full_name.as_deref())),
                        ("subject", subject.clone()),
                        (
                            "message",
                            format!(
                                "{} invited you to {APP_NAME} as {}. Accept here: {link}",
                                inv.invited_by, inv.role
                            ),
                        ),
                    ],
                ),
                Strategy::new(
                    "general_minimal",
                    General,
                    [
                        ("to_email", to),
                        ("message", format!("Join {APP_NAME}: {link}")),
                    ],
                ),
            ],

            Self::RegistrationWelcome(reg) => vec![
                Strategy::new(
                    "general_structured",
                    General,
                    [
                        ("to_email", to.clone()),
                        ("to_name", reg.greeting_name().to_string()),
                        ("subject", subject.clone()),
                        ("role", reg.role.as_str().to_string()),
                        ("account_id", or_none(reg.public_id.as_deref())),
                        ("dashboard_link", dashboard_link(&routing.site_url)),
                    ],
                ),
                Strategy::new(
                    "general_minimal",
                    General,
                    [
                        ("to_email", to),
                        ("subject", subject),
                        (
                            "message",
                            format!(
                                "Welcome to {APP_NAME}, {}. Your dashboard: {}",
                                reg.greeting_name(),
                                dashboard_link(&routing.site_url)
                            ),
                        ),
                    ],
                ),
            ],

            Self::ChangeRequest(notice) => vec![
                Strategy::new(
                    "general_structured",
                    General,
                    [
                        ("to_email", to.clone()),
                        ("subject", subject.clone()),
                        ("request_id", notice.request_id.clone()),
                        ("order_id", notice.order_id.clone()),
                        ("request_type", notice.request_type.label().to_string()),
                        ("reason", notice.reason.clone()),
                        ("details", or_none(notice.details.as_deref())),
                        ("requester_email", notice.requester_email.clone()),
                        ("stored_in", or_none(notice.stored_in.as_deref())),
                    ],
                ),
                Strategy::new(
                    "general_minimal",
                    General,
                    [
                        ("to_email", to),
                        ("subject", subject),
                        (
                            "message",
                            format!(
                                "{} for {} from {}: {}",
                                notice.request_type.label(),
                                notice.order_id,
                                notice.requester_email,
                                notice.reason
                            ),
                        ),
                    ],
                ),
            ],

            Self::ManualProcessing(notice) => vec![
                Strategy::new(
                    "general_structured",
                    General,
                    [
                        ("to_email", to.clone()),
                        ("subject", subject.clone()),
                        ("message", manual_processing_body(notice)),
                        ("order_id", notice.order_id.clone()),
                        ("reason", notice.reason.clone()),
                        ("requester_email", notice.requester_email.clone()),
                    ],
                ),
                Strategy::new(
                    "verification_plaintext",
                    Verification,
                    [
                        ("to_email", to.clone()),
                        ("to_name", "Admin".to_string()),
                        ("subject", subject.clone()),
                        ("message", manual_processing_body(notice)),
                    ],
                ),
                Strategy::new(
                    "general_minimal",
                    General,
                    [
                        ("to_email", to),
                        ("subject", subject),
                        (
                            "message",
                            format!(
                                "MANUAL PROCESSING: {} order_id={} requester={} reason={} details={}",
                                notice.request_type.as_str(),
                                notice.order_id,
                                notice.requester_email,
                                notice.reason,
                                notice.details.as_deref().unwrap_or("")
                            ),
                        ),
                    ],
                ),
            ],
        }
    }
}

/// Full request payload, verbatim, for the admin to enter by hand
pub(crate) fn manual_processing_body(notice: &ChangeRequestNotice) -> String {
    format!(
        "DATABASE STORAGE FAILED - PROCESS MANUALLY\n\n\
         The change request below could not be saved. Create it by hand.\n\n\
         Request ID: {}\n\
         Order ID: {}\n\
         Type: {}\n\
         Requester: {} ({})\n\
         Reason: {}\n\
         Details: {}",
        notice.request_id,
        notice.order_id,
        notice.request_type.as_str(),
        notice.requester_email,
        notice.requester_id,
        notice.reason,
        notice.details.as_deref().unwrap_or(""),
    )
}

/// One sample of every notification type, for the startup table check
pub(crate) fn samples() -> Vec<Notification> {
    let order = Order {
        id: None,
        order_id: "ORD0000000000".into(),
        buyer_id: "sample".into(),
        buyer_email: "buyer@example.com".into(),
        buyer_company: None,
        supplier_id: None,
        supplier_name: "Sample Supplier".into(),
        supplier_email: Some("supplier@example.com".into()),
        supplier_phone: None,
        supplier_wechat: None,
        product_description: "Sample".into(),
        deal_amount: Decimal::ONE,
        supplier_bank_account: None,
        selected_services: Default::default(),
        service_cost: Decimal::ZERO,
        total_amount: Decimal::ONE,
        status: shared::models::OrderStatus::PendingReview,
        created_at: 0,
        updated_at: 0,
    };
    let service_order = ServiceOrder {
        id: None,
        order_id: "SRV0000000000".into(),
        buyer_id: "sample".into(),
        buyer_email: "buyer@example.com".into(),
        buyer_company: None,
        service_type: ServiceId::Testing,
        service_details: Default::default(),
        service_cost: Decimal::ZERO,
        total_amount: Decimal::ZERO,
        status: shared::models::OrderStatus::PendingReview,
        created_at: 0,
        updated_at: 0,
    };
    let invitation = Invitation {
        recipient_email: "friend@example.com".into(),
        recipient_name: None,
        message: None,
        sender_name: "Sample".into(),
        sender_email: "sender@example.com".into(),
        referral_code: "BUY00000000".into(),
    };
    let notice = ChangeRequestNotice {
        request_id: "sample".into(),
        order_id: order.order_id.clone(),
        request_type: RequestType::Edit,
        reason: "sample".into(),
        details: None,
        requester_id: "sample".into(),
        requester_email: "buyer@example.com".into(),
        stored_in: None,
    };

    vec![
        Notification::VerificationCode {
            email: "user@example.com".into(),
            display_name: "User".into(),
            purpose: VerificationPurpose::Signup,
            code: "000000".into(),
        },
        Notification::ContactForm(ContactForm {
            full_name: "Sample".into(),
            email: "user@example.com".into(),
            subject: "Sample".into(),
            message: "Sample".into(),
        }),
        Notification::OrderCreated(Box::new(order.clone())),
        Notification::ServiceOrderCreated(Box::new(service_order)),
        Notification::SupplierInvite {
            supplier_email: "supplier@example.com".into(),
            order: Box::new(order),
        },
        Notification::BuyerInvitation(invitation.clone()),
        Notification::SupplierInvitation(invitation),
        Notification::UserInvitation(UserInvitation {
            email: "new@example.com".into(),
            full_name: None,
            role: UserRole::Supplier,
            invited_by: "Admin".into(),
            invite_token: "token".into(),
        }),
        Notification::RegistrationWelcome(Registration {
            email: "new@example.com".into(),
            full_name: None,
            company_name: None,
            role: UserRole::Buyer,
            public_id: None,
        }),
        Notification::ChangeRequest(notice.clone()),
        Notification::ManualProcessing(notice),
    ]
}

/// Every notification type has at least one strategy, unique labels, and
/// every strategy addresses a recipient.
pub fn validate_strategy_tables(routing: &Routing) -> Result<(), String> {
    for notification in samples() {
        let strategies = notification.strategies(routing);
        let kind = notification.kind();
        if strategies.is_empty() {
            return Err(format!("{kind} has no delivery strategy"));
        }
        for (i, strategy) in strategies.iter().enumerate() {
            if strategies[..i].iter().any(|s| s.label == strategy.label) {
                return Err(format!("{kind} repeats strategy {}", strategy.label));
            }
            if strategy.params.get("to_email").is_none_or(|v| v.is_empty()) {
                return Err(format!("{kind}/{} has no recipient", strategy.label));
            }
        }
    }
    Ok(())
}
