//! Order and service-order creation plus scoped reads

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Order, OrderCreate, OrderRequest, OrderStatus, ServiceOrder, ServiceOrderCreate,
    SupplierType, UserProfile, UserRole, service_cost,
};
use shared::util::{generate_order_id, generate_service_order_id, now_millis};
use std::future::Future;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

use crate::auth::Identity;
use crate::db::{RepoError, RepoErrorKind, Repository};
use crate::email::Notifier;
use crate::error::ServiceResult;

/// Generated identifiers are retried this many times on a uniqueness conflict
const MAX_INSERT_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct OrderService {
    pub(super) repo: Arc<dyn Repository>,
    pub(super) notifier: Notifier,
    /// Fire-and-forget notifications; drained on shutdown
    pub(super) tracker: TaskTracker,
}

/// Supplier fields copied onto the order at creation time
struct SupplierSnapshot {
    id: Option<String>,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    wechat: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_blank_owned(value: Option<String>) -> Option<String> {
    non_blank(value.as_deref()).map(str::to_string)
}

/// Insert with a fresh identifier per attempt until no conflict is reported
async fn insert_with_retry<T, F, Fut>(what: &str, mut attempt: F) -> Result<T, RepoError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepoError>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Err(e) if e.kind == RepoErrorKind::Conflict && tries < MAX_INSERT_ATTEMPTS => {
                tracing::warn!(what, attempt = tries, "Identifier conflict, regenerating");
            }
            other => return other,
        }
    }
}

impl OrderService {
    pub fn new(repo: Arc<dyn Repository>, notifier: Notifier, tracker: TaskTracker) -> Self {
        Self {
            repo,
            notifier,
            tracker,
        }
    }

    /// Validate, price, persist, then notify in the background.
    ///
    /// Validation errors are returned before anything is written. Notification
    /// failures are logged and never affect the stored order.
    pub async fn create_order(&self, identity: &Identity, input: OrderCreate) -> ServiceResult<Order> {
        let deal_amount = input.deal_amount.round_dp(2);
        if deal_amount < Decimal::ONE {
            return Err(AppError::new(ErrorCode::DealAmountInvalid).into());
        }
        let product_description = input.product_description.trim().to_string();
        if product_description.is_empty() {
            return Err(AppError::required("product_description").into());
        }
        match input.supplier_type {
            SupplierType::Existing if non_blank(input.supplier_id.as_deref()).is_none() => {
                return Err(AppError::with_message(
                    ErrorCode::SupplierSelectionInvalid,
                    "Select an existing supplier",
                )
                .into());
            }
            SupplierType::New
                if non_blank(input.supplier_name.as_deref()).is_none()
                    || !non_blank(input.supplier_email.as_deref()).is_some_and(|e| e.contains('@')) =>
            {
                return Err(AppError::with_message(
                    ErrorCode::SupplierSelectionInvalid,
                    "A new supplier needs a name and a valid email",
                )
                .into());
            }
            _ => {}
        }

        let buyer = self.repo.find_user(&identity.user_id).await?;
        let supplier = self.supplier_snapshot(&input).await?;

        let service_cost = service_cost(&input.selected_services);
        let status = match input.supplier_type {
            SupplierType::New => OrderStatus::PendingSupplierRegistration,
            SupplierType::Existing => OrderStatus::PendingReview,
        };
        let now = now_millis();
        let draft = Order {
            id: None,
            order_id: String::new(),
            buyer_id: identity.user_id.clone(),
            buyer_email: buyer
                .as_ref()
                .map(|b| b.email.clone())
                .unwrap_or_else(|| identity.email.clone()),
            buyer_company: buyer.and_then(|b| b.company_name),
            supplier_id: supplier.id,
            supplier_name: supplier.name,
            supplier_email: supplier.email,
            supplier_phone: supplier.phone,
            supplier_wechat: supplier.wechat,
            product_description,
            deal_amount,
            supplier_bank_account: non_blank_owned(input.supplier_bank_account),
            selected_services: input.selected_services,
            service_cost,
            total_amount: (deal_amount + service_cost).round_dp(2),
            status,
            created_at: now,
            updated_at: now,
        };

        let order = insert_with_retry("order", || {
            let repo = self.repo.clone();
            let candidate = Order {
                order_id: generate_order_id(),
                ..draft.clone()
            };
            async move { repo.insert_order(&candidate).await }
        })
        .await?;

        tracing::info!(
            order_id = %order.order_id,
            buyer_id = %order.buyer_id,
            status = %order.status,
            total = %order.total_amount,
            "Order created"
        );

        let notifier = self.notifier.clone();
        let created = order.clone();
        self.tracker.spawn(async move {
            if let Err(e) = notifier.send_order_notification(&created).await {
                tracing::warn!(order_id = %created.order_id, error = %e, "Order notification failed");
            }
            if created.has_new_supplier()
                && let Err(e) = notifier.send_supplier_invite(&created).await
            {
                tracing::warn!(order_id = %created.order_id, error = %e, "Supplier invite failed");
            }
        });

        Ok(order)
    }

    async fn supplier_snapshot(&self, input: &OrderCreate) -> ServiceResult<SupplierSnapshot> {
        match input.supplier_type {
            SupplierType::New => Ok(SupplierSnapshot {
                id: None,
                name: non_blank(input.supplier_name.as_deref())
                    .unwrap_or_default()
                    .to_string(),
                email: non_blank(input.supplier_email.as_deref()).map(str::to_lowercase),
                phone: non_blank_owned(input.supplier_phone.clone()),
                wechat: non_blank_owned(input.supplier_wechat.clone()),
            }),
            SupplierType::Existing => {
                let id = non_blank(input.supplier_id.as_deref()).unwrap_or_default();
                let profile: UserProfile = self
                    .repo
                    .find_user(id)
                    .await?
                    .filter(|u| u.role == UserRole::Supplier)
                    .ok_or_else(|| AppError::new(ErrorCode::SupplierNotFound))?;
                Ok(SupplierSnapshot {
                    name: profile.display_name().to_string(),
                    id: Some(profile.user_id),
                    email: Some(profile.email),
                    phone: profile.phone,
                    wechat: profile.wechat,
                })
            }
        }
    }

    /// Price a single add-on service and persist it as its own order
    pub async fn create_service_order(
        &self,
        identity: &Identity,
        input: ServiceOrderCreate,
    ) -> ServiceResult<ServiceOrder> {
        let missing = input.missing_details();
        if !missing.is_empty() {
            return Err(AppError::with_message(
                ErrorCode::ServiceDetailsIncomplete,
                format!("Missing details: {}", missing.join(", ")),
            )
            .with_detail("missing", missing)
            .into());
        }

        let buyer = self.repo.find_user(&identity.user_id).await?;
        let cost = input.service_type.fixed_cost().round_dp(2);
        let now = now_millis();
        let draft = ServiceOrder {
            id: None,
            order_id: String::new(),
            buyer_id: identity.user_id.clone(),
            buyer_email: buyer
                .as_ref()
                .map(|b| b.email.clone())
                .unwrap_or_else(|| identity.email.clone()),
            buyer_company: buyer.and_then(|b| b.company_name),
            service_type: input.service_type,
            service_details: input.service_details,
            service_cost: cost,
            total_amount: cost,
            status: OrderStatus::PendingReview,
            created_at: now,
            updated_at: now,
        };

        let order = insert_with_retry("service_order", || {
            let repo = self.repo.clone();
            let candidate = ServiceOrder {
                order_id: generate_service_order_id(),
                ..draft.clone()
            };
            async move { repo.insert_service_order(&candidate).await }
        })
        .await?;

        tracing::info!(
            order_id = %order.order_id,
            service = %order.service_type,
            "Service order created"
        );

        let notifier = self.notifier.clone();
        let created = order.clone();
        self.tracker.spawn(async move {
            if let Err(e) = notifier.send_service_order_notification(&created).await {
                tracing::warn!(order_id = %created.order_id, error = %e, "Service order notification failed");
            }
        });

        Ok(order)
    }

    pub async fn list_orders(&self, identity: &Identity) -> ServiceResult<Vec<Order>> {
        Ok(self.repo.list_orders(&identity.order_scope()).await?)
    }

    /// Orders outside the caller's scope read as not found
    pub async fn get_order(&self, identity: &Identity, order_id: &str) -> ServiceResult<Order> {
        let scope = identity.order_scope();
        let order = self
            .repo
            .find_order(order_id)
            .await?
            .filter(|o| scope.includes(o))
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        Ok(order)
    }

    pub async fn list_change_requests(
        &self,
        identity: &Identity,
        order_id: &str,
    ) -> ServiceResult<Vec<OrderRequest>> {
        let order = self.get_order(identity, order_id).await?;
        Ok(self.repo.list_order_requests(&order.order_id).await?)
    }

    pub async fn list_service_orders(&self, identity: &Identity) -> ServiceResult<Vec<ServiceOrder>> {
        let buyer = (!identity.is_admin()).then_some(identity.user_id.as_str());
        Ok(self.repo.list_service_orders(buyer).await?)
    }
}
