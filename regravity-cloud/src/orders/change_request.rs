//! Edit/cancel requests with tiered storage
//!
//! A request is stored by the first tier that works:
//!
//! 1. `typed_insert` - normal insert into `order_requests`
//! 2. `raw_sql` - bootstrap the table and insert through `execute_sql`
//! 3. `email_only` - mail the admin a "process manually" notice; nothing is stored
//!
//! Tiers run strictly one after another. Tier 3 success is still a success
//! for the caller.

use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{OrderRequest, OrderRequestCreate, OrderStatus, RequestStatus};
use shared::util::now_millis;
use std::fmt;

use super::OrderService;
use crate::auth::Identity;
use crate::db::order_requests::{BOOTSTRAP_TABLE_SQL, raw_insert_statement};
use crate::db::{RepoError, RepoErrorKind};
use crate::email::{ChangeRequestNotice, DispatchFailure};
use crate::error::{ServiceResult, repo_error_code};
use crate::fallback::{Exhausted, Step, first_success};

/// Whether a buyer may still ask for changes on an order in `status`
pub fn can_request_change(status: OrderStatus) -> bool {
    status.allows_change_request()
}

/// Where a change request ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    Table,
    RawSql,
    EmailOnly,
}

impl StorageTier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Table => "typed_insert",
            Self::RawSql => "raw_sql",
            Self::EmailOnly => "email_only",
        }
    }

    fn stored_in(&self) -> Option<&'static str> {
        match self {
            Self::Table => Some("order_requests table"),
            Self::RawSql => Some("order_requests table (raw sql)"),
            Self::EmailOnly => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeRequestOutcome {
    pub tier: StorageTier,
    /// Stored without a database record
    pub degraded: bool,
    pub request_id: String,
    /// The persisted record; `None` when only an email was sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<OrderRequest>,
    pub message: String,
}

#[derive(Debug)]
enum TierError {
    Repo(RepoError),
    Delivery(DispatchFailure),
}

impl fmt::Display for TierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repo(e) => write!(f, "{e}"),
            Self::Delivery(e) => write!(f, "{e}"),
        }
    }
}

/// Every tier failed: classify from the most recent storage error
fn exhausted_error(exhausted: Exhausted<TierError>) -> AppError {
    let repo_kind = exhausted.attempts.iter().rev().find_map(|a| match &a.error {
        TierError::Repo(e) => Some(e.kind),
        TierError::Delivery(_) => None,
    });
    let code = match repo_kind {
        Some(kind @ (RepoErrorKind::PermissionDenied | RepoErrorKind::MissingSchema)) => {
            repo_error_code(kind)
        }
        _ => ErrorCode::ChangeRequestFailed,
    };

    let mut err = AppError::new(code).with_detail(
        "attempts",
        exhausted
            .attempts
            .iter()
            .map(|a| a.label)
            .collect::<Vec<_>>(),
    );
    if let Some(kind) = repo_kind {
        err = err.with_detail("storage_error", kind.as_str());
    }
    if let Some(TierError::Delivery(failure)) = exhausted.into_last().map(|a| a.error) {
        err = err
            .with_detail("delivery_error", failure.last.message)
            .with_detail("manual_fallback", failure.manual_fallback);
    }
    err
}

impl OrderService {
    /// Raise an edit or cancel request against one of the caller's orders
    pub async fn create_change_request(
        &self,
        identity: &Identity,
        order_id: &str,
        input: OrderRequestCreate,
    ) -> ServiceResult<ChangeRequestOutcome> {
        let order = self.get_order(identity, order_id).await?;
        if order.buyer_id != identity.user_id && !identity.is_admin() {
            return Err(AppError::permission_denied("Only the buyer can request changes").into());
        }
        if !can_request_change(order.status) {
            return Err(AppError::with_message(
                ErrorCode::ChangeRequestNotAllowed,
                format!(
                    "Changes cannot be requested while the order is {}",
                    order.status.meta().label
                ),
            )
            .into());
        }
        let reason = input.reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::new(ErrorCode::ChangeReasonRequired).into());
        }

        let now = now_millis();
        let request = OrderRequest {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order.order_id.clone(),
            buyer_id: order.buyer_id.clone(),
            request_type: input.request_type,
            reason,
            details: input
                .details
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            status: RequestStatus::Pending,
            admin_response: None,
            admin_id: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };
        let notice = ChangeRequestNotice {
            request_id: request.id.clone(),
            order_id: request.order_id.clone(),
            request_type: request.request_type,
            reason: request.reason.clone(),
            details: request.details.clone(),
            requester_id: identity.user_id.clone(),
            requester_email: identity.email.clone(),
            stored_in: None,
        };

        let repo = &self.repo;
        let notifier = &self.notifier;
        let (pending, manual) = (&request, &notice);
        let steps: Vec<Step<'_, (StorageTier, Option<OrderRequest>), TierError>> = vec![
            Step::new(StorageTier::Table.label(), move || async move {
                repo.insert_order_request(pending)
                    .await
                    .map(|stored| (StorageTier::Table, Some(stored)))
                    .map_err(TierError::Repo)
            }),
            Step::new(StorageTier::RawSql.label(), move || async move {
                repo.execute_sql(BOOTSTRAP_TABLE_SQL)
                    .await
                    .map_err(TierError::Repo)?;
                repo.execute_sql(&raw_insert_statement(pending))
                    .await
                    .map_err(TierError::Repo)?;
                Ok((StorageTier::RawSql, Some(pending.clone())))
            }),
            Step::new(StorageTier::EmailOnly.label(), move || async move {
                notifier
                    .send_manual_processing(manual.clone())
                    .await
                    .map(|_| (StorageTier::EmailOnly, None))
                    .map_err(TierError::Delivery)
            }),
        ];

        let (tier, stored) = match first_success("change_request", steps).await {
            Ok(ok) => ok.value,
            Err(exhausted) => {
                tracing::error!(
                    order_id = %request.order_id,
                    request_id = %request.id,
                    "Change request could not be stored or mailed"
                );
                return Err(exhausted_error(exhausted).into());
            }
        };

        tracing::info!(
            order_id = %request.order_id,
            request_id = %request.id,
            tier = tier.label(),
            "Change request accepted"
        );

        if let Some(stored_in) = tier.stored_in() {
            let notifier = self.notifier.clone();
            let notice = ChangeRequestNotice {
                stored_in: Some(stored_in.to_string()),
                ..notice
            };
            self.tracker.spawn(async move {
                if let Err(e) = notifier.notify_change_request(notice).await {
                    tracing::warn!(error = %e, "Change request admin notice failed");
                }
            });
        }

        let message = match tier {
            StorageTier::EmailOnly => {
                "Your request was sent to our team for manual processing".to_string()
            }
            StorageTier::Table | StorageTier::RawSql => {
                format!("{} submitted for review", request.request_type.label())
            }
        };
        Ok(ChangeRequestOutcome {
            tier,
            degraded: tier == StorageTier::EmailOnly,
            request_id: request.id.clone(),
            request: stored,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::service::tests::{buyer, order_service};
    use crate::testing::{MockRepository, MockTransport, sample_order};
    use shared::models::RequestType;
    use std::sync::Arc;

    fn approved_order() -> shared::models::Order {
        let mut order = sample_order();
        order.status = OrderStatus::Approved;
        order
    }

    fn cancel(reason: &str) -> OrderRequestCreate {
        OrderRequestCreate {
            request_type: RequestType::Cancel,
            reason: reason.into(),
            details: Some("Invoice says 1100, agreed 1000".into()),
        }
    }

    #[test]
    fn test_can_request_change() {
        for status in OrderStatus::ALL {
            let expected = matches!(
                status,
                OrderStatus::PendingReview
                    | OrderStatus::PendingSupplierRegistration
                    | OrderStatus::Approved
            );
            assert_eq!(can_request_change(status), expected, "{status}");
        }
    }

    #[tokio::test]
    async fn test_typed_insert_skips_other_tiers() {
        let repo = Arc::new(MockRepository::new().with_order(approved_order()));
        let transport = Arc::new(MockTransport::succeeding());
        let svc = order_service(repo.clone(), transport.clone());

        let outcome = svc
            .create_change_request(&buyer(), "ORDA1B2C3D4E5", cancel("wrong amount"))
            .await
            .unwrap();

        assert_eq!(outcome.tier, StorageTier::Table);
        assert!(!outcome.degraded);
        assert_eq!(repo.requests().len(), 1);
        assert!(repo.executed_sql().is_empty());

        svc.tracker.close();
        svc.tracker.wait().await;
        // Only the structured admin summary
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_raw_sql_tier_after_typed_failure() {
        let repo = Arc::new(
            MockRepository::new()
                .with_order(approved_order())
                .fail_typed_request_insert(RepoErrorKind::MissingSchema),
        );
        let svc = order_service(repo.clone(), Arc::new(MockTransport::succeeding()));

        let outcome = svc
            .create_change_request(&buyer(), "ORDA1B2C3D4E5", cancel("wrong amount"))
            .await
            .unwrap();

        assert_eq!(outcome.tier, StorageTier::RawSql);
        let sql = repo.executed_sql();
        assert_eq!(sql.len(), 2);
        assert_eq!(sql[0], BOOTSTRAP_TABLE_SQL);
        assert!(sql[1].contains("'wrong amount'"));
        assert!(sql[1].contains(&outcome.request_id));
    }

    #[tokio::test]
    async fn test_email_only_is_degraded_success() {
        let repo = Arc::new(
            MockRepository::new()
                .with_order(approved_order())
                .fail_typed_request_insert(RepoErrorKind::PermissionDenied)
                .fail_execute_sql(RepoErrorKind::PermissionDenied),
        );
        let transport = Arc::new(MockTransport::succeeding());
        let svc = order_service(repo.clone(), transport.clone());

        let outcome = svc
            .create_change_request(&buyer(), "ORDA1B2C3D4E5", cancel("wrong amount"))
            .await
            .unwrap();

        assert_eq!(outcome.tier, StorageTier::EmailOnly);
        assert!(outcome.degraded);
        assert!(outcome.request.is_none());
        assert!(repo.requests().is_empty());

        svc.tracker.close();
        svc.tracker.wait().await;
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let body: String = calls[0].params.values().cloned().collect::<Vec<_>>().join("\n");
        for expected in [
            "wrong amount",
            "ORDA1B2C3D4E5",
            "Invoice says 1100, agreed 1000",
            "buyer@acme.test",
        ] {
            assert!(body.contains(expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn test_all_tiers_failing_is_classified() {
        let repo = Arc::new(
            MockRepository::new()
                .with_order(approved_order())
                .fail_typed_request_insert(RepoErrorKind::MissingSchema)
                .fail_execute_sql(RepoErrorKind::PermissionDenied),
        );
        let transport = Arc::new(MockTransport::failing_with_messages(["a", "b", "c"]));
        let svc = order_service(repo, transport);

        let err: AppError = svc
            .create_change_request(&buyer(), "ORDA1B2C3D4E5", cancel("wrong amount"))
            .await
            .unwrap_err()
            .into();

        assert_eq!(err.code, ErrorCode::StoragePermissionDenied);
        let details = err.details.unwrap();
        assert_eq!(details["storage_error"], "permission_denied");
        assert!(
            details["manual_fallback"]
                .as_str()
                .unwrap()
                .contains("wrong amount")
        );
    }

    #[tokio::test]
    async fn test_rejected_before_any_write() {
        let mut completed = sample_order();
        completed.status = OrderStatus::Completed;
        let repo = Arc::new(MockRepository::new().with_order(completed));
        let transport = Arc::new(MockTransport::succeeding());
        let svc = order_service(repo.clone(), transport.clone());

        let err: AppError = svc
            .create_change_request(&buyer(), "ORDA1B2C3D4E5", cancel("too late"))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::ChangeRequestNotAllowed);

        let repo = Arc::new(MockRepository::new().with_order(approved_order()));
        let svc = order_service(repo.clone(), transport.clone());
        let err: AppError = svc
            .create_change_request(&buyer(), "ORDA1B2C3D4E5", cancel("   "))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::ChangeReasonRequired);

        assert!(repo.requests().is_empty());
        assert!(transport.calls().is_empty());
    }
}
