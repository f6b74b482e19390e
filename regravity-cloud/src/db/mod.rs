//! Database access layer
//!
//! [`Repository`] is the seam to the hosted relational store. [`PgRepository`]
//! implements it over free functions per table, each taking `&PgPool`.

pub mod order_requests;
pub mod orders;
pub mod service_orders;
pub mod users;

use async_trait::async_trait;
use shared::models::{Order, OrderRequest, ServiceOrder, UserProfile};
use sqlx::PgPool;
use std::fmt;

/// Classified repository failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoErrorKind {
    /// Row-level policy or grant refused the statement
    PermissionDenied,
    /// Table or column does not exist
    MissingSchema,
    /// Unique constraint violation
    Conflict,
    Generic,
}

impl RepoErrorKind {
    /// Classify a Postgres SQLSTATE
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            "42501" => Self::PermissionDenied,
            "42P01" | "42703" => Self::MissingSchema,
            "23505" => Self::Conflict,
            _ => Self::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::MissingSchema => "missing_schema",
            Self::Conflict => "conflict",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for RepoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RepoError {
    pub kind: RepoErrorKind,
    pub message: String,
}

impl RepoError {
    pub fn new(kind: RepoErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        let kind = e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| RepoErrorKind::from_sqlstate(&code))
            .unwrap_or(RepoErrorKind::Generic);
        Self::new(kind, e.to_string())
    }
}

/// Rows stored with an unknown enum value or malformed JSON
pub(crate) fn decode_error(what: &str, e: impl fmt::Display) -> RepoError {
    RepoError::new(RepoErrorKind::Generic, format!("invalid {what} in row: {e}"))
}

/// Which orders a caller may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderScope {
    Buyer(String),
    Supplier(String),
    All,
}

impl OrderScope {
    pub fn buyer_id(&self) -> Option<&str> {
        match self {
            Self::Buyer(id) => Some(id),
            _ => None,
        }
    }

    pub fn supplier_id(&self) -> Option<&str> {
        match self {
            Self::Supplier(id) => Some(id),
            _ => None,
        }
    }

    pub fn includes(&self, order: &Order) -> bool {
        match self {
            Self::Buyer(id) => &order.buyer_id == id,
            Self::Supplier(id) => order.supplier_id.as_ref() == Some(id),
            Self::All => true,
        }
    }
}

/// Hosted store collaborator
#[async_trait]
pub trait Repository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<Order, RepoError>;
    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, RepoError>;
    async fn list_orders(&self, scope: &OrderScope) -> Result<Vec<Order>, RepoError>;
    /// Orders in scope with `start <= created_at <= end`
    async fn list_orders_between(
        &self,
        scope: &OrderScope,
        start: i64,
        end: i64,
    ) -> Result<Vec<Order>, RepoError>;

    async fn insert_service_order(&self, order: &ServiceOrder) -> Result<ServiceOrder, RepoError>;
    /// `None` lists every buyer's service orders
    async fn list_service_orders(
        &self,
        buyer_id: Option<&str>,
    ) -> Result<Vec<ServiceOrder>, RepoError>;
    /// Service orders have no supplier side: a supplier scope lists nothing
    async fn list_service_orders_between(
        &self,
        scope: &OrderScope,
        start: i64,
        end: i64,
    ) -> Result<Vec<ServiceOrder>, RepoError>;

    async fn insert_order_request(&self, request: &OrderRequest)
    -> Result<OrderRequest, RepoError>;
    async fn list_order_requests(&self, order_id: &str) -> Result<Vec<OrderRequest>, RepoError>;

    /// Matches either the identity-provider id or the public `BUY`/`SUP` id
    async fn find_user(&self, id: &str) -> Result<Option<UserProfile>, RepoError>;
    async fn list_users_between(&self, start: i64, end: i64)
    -> Result<Vec<UserProfile>, RepoError>;

    /// Privileged escape hatch: run one arbitrary statement, return rows affected
    async fn execute_sql(&self, sql: &str) -> Result<u64, RepoError>;
}

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn insert_order(&self, order: &Order) -> Result<Order, RepoError> {
        orders::insert(&self.pool, order).await
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, RepoError> {
        orders::find_by_order_id(&self.pool, order_id).await
    }

    async fn list_orders(&self, scope: &OrderScope) -> Result<Vec<Order>, RepoError> {
        orders::list(&self.pool, scope).await
    }

    async fn list_orders_between(
        &self,
        scope: &OrderScope,
        start: i64,
        end: i64,
    ) -> Result<Vec<Order>, RepoError> {
        orders::list_between(&self.pool, scope, start, end).await
    }

    async fn insert_service_order(&self, order: &ServiceOrder) -> Result<ServiceOrder, RepoError> {
        service_orders::insert(&self.pool, order).await
    }

    async fn list_service_orders(
        &self,
        buyer_id: Option<&str>,
    ) -> Result<Vec<ServiceOrder>, RepoError> {
        service_orders::list(&self.pool, buyer_id).await
    }

    async fn list_service_orders_between(
        &self,
        scope: &OrderScope,
        start: i64,
        end: i64,
    ) -> Result<Vec<ServiceOrder>, RepoError> {
        if let OrderScope::Supplier(_) = scope {
            return Ok(Vec::new());
        }
        service_orders::list_between(&self.pool, scope.buyer_id(), start, end).await
    }

    async fn insert_order_request(
        &self,
        request: &OrderRequest,
    ) -> Result<OrderRequest, RepoError> {
        order_requests::insert(&self.pool, request).await
    }

    async fn list_order_requests(&self, order_id: &str) -> Result<Vec<OrderRequest>, RepoError> {
        order_requests::list_for_order(&self.pool, order_id).await
    }

    async fn find_user(&self, id: &str) -> Result<Option<UserProfile>, RepoError> {
        users::find(&self.pool, id).await
    }

    async fn list_users_between(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<UserProfile>, RepoError> {
        users::list_between(&self.pool, start, end).await
    }

    async fn execute_sql(&self, sql: &str) -> Result<u64, RepoError> {
        let result = sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(
            RepoErrorKind::from_sqlstate("42501"),
            RepoErrorKind::PermissionDenied
        );
        assert_eq!(
            RepoErrorKind::from_sqlstate("42P01"),
            RepoErrorKind::MissingSchema
        );
        assert_eq!(
            RepoErrorKind::from_sqlstate("42703"),
            RepoErrorKind::MissingSchema
        );
        assert_eq!(RepoErrorKind::from_sqlstate("23505"), RepoErrorKind::Conflict);
        assert_eq!(RepoErrorKind::from_sqlstate("08006"), RepoErrorKind::Generic);
    }

    #[test]
    fn test_non_database_error_is_generic() {
        let err: RepoError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind, RepoErrorKind::Generic);
        assert!(err.to_string().starts_with("generic: "));
    }
}
