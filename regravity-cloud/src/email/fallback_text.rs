//! Human-readable text for hand delivery when every strategy failed

use super::notification::{CODE_TTL_MINUTES, Notification, Routing, manual_processing_body};

/// Plain message an operator can copy into a mail client.
///
/// Includes the recipient, subject and any code or registration link.
pub fn manual_fallback_text(notification: &Notification, routing: &Routing) -> String {
    let to = notification.recipient(routing);
    let subject = notification.subject();
    let link = notification.registration_link(routing).unwrap_or_default();

    let body = match notification {
        Notification::VerificationCode {
            display_name,
            purpose,
            code,
            ..
        } => format!(
            "Hi {display_name},\n\nYour verification code is: {code}\n\
             Enter it to {} within {CODE_TTL_MINUTES} minutes.",
            purpose.action()
        ),
        Notification::ContactForm(form) => format!(
            "Contact form submission\n\nFrom: {} <{}>\nSubject: {}\n\n{}",
            form.full_name, form.email, form.subject, form.message
        ),
        Notification::OrderCreated(order) => format!(
            "New order {}\n\nBuyer: {}\nSupplier: {}\nProduct: {}\n\
             Deal amount: {}\nService cost: {}\nTotal: {}\nStatus: {}",
            order.order_id,
            order.buyer_email,
            order.supplier_name,
            order.product_description,
            order.deal_amount,
            order.service_cost,
            order.total_amount,
            order.status.meta().label,
        ),
        Notification::ServiceOrderCreated(order) => format!(
            "New service order {}\n\nBuyer: {}\nService: {}\nDetails:\n{}",
            order.order_id,
            order.buyer_email,
            order.service_type.label(),
            order
                .service_details
                .iter()
                .map(|(k, v)| format!("  {k}: {v}"))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Notification::SupplierInvite { order, .. } => format!(
            "Hello {},\n\n{} created order {} with you for \"{}\" ({}).\n\
             Register to review it: {link}",
            order.supplier_name,
            order.buyer_company.as_deref().unwrap_or(&order.buyer_email),
            order.order_id,
            order.product_description,
            order.deal_amount,
        ),
        Notification::BuyerInvitation(inv) | Notification::SupplierInvitation(inv) => format!(
            "Hello {},\n\n{} ({}) invited you to join Regravity.{}\n\nRegister here: {link}",
            inv.recipient_name.as_deref().unwrap_or("there"),
            inv.sender_name,
            inv.sender_email,
            inv.message
                .as_deref()
                .map(|m| format!("\n\n\"{m}\""))
                .unwrap_or_default(),
        ),
        Notification::UserInvitation(inv) => format!(
            "Hello {},\n\n{} invited you to Regravity as {}.\n\nAccept here: {link}",
            inv.full_name.as_deref().unwrap_or("there"),
            inv.invited_by,
            inv.role,
        ),
        Notification::RegistrationWelcome(reg) => format!(
            "Welcome to Regravity!\n\nAccount: {}\nRole: {}\nID: {}",
            reg.email,
            reg.role,
            reg.public_id.as_deref().unwrap_or("pending"),
        ),
        Notification::ChangeRequest(notice) => format!(
            "{} for order {}\n\nRequester: {}\nReason: {}\nDetails: {}",
            notice.request_type.label(),
            notice.order_id,
            notice.requester_email,
            notice.reason,
            notice.details.as_deref().unwrap_or(""),
        ),
        Notification::ManualProcessing(notice) => manual_processing_body(notice),
    };

    format!("To: {to}\nSubject: {subject}\n\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::notification::samples;
    use reqwest::Url;

    fn routing() -> Routing {
        Routing {
            admin_email: "admin@regravity.test".into(),
            support_email: "support@regravity.test".into(),
            operations_email: "ops@regravity.test".into(),
            site_url: Url::parse("https://app.regravity.test").unwrap(),
        }
    }

    #[test]
    fn test_every_type_has_recipient_and_subject() {
        for n in samples() {
            let text = manual_fallback_text(&n, &routing());
            assert!(text.starts_with("To: "), "{}", n.kind());
            assert!(text.contains(&n.subject()), "{}", n.kind());
        }
    }

    #[test]
    fn test_code_and_links_included() {
        for n in samples() {
            let text = manual_fallback_text(&n, &routing());
            if let Some(link) = n.registration_link(&routing()) {
                assert!(text.contains(&link), "{} missing link", n.kind());
            }
            if let Notification::VerificationCode { code, .. } = &n {
                assert!(text.contains(code.as_str()));
            }
        }
    }
}
