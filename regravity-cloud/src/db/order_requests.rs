//! Edit/cancel requests table, plus the raw-SQL statements used when the
//! typed path is unavailable

use shared::models::OrderRequest;
use sqlx::PgPool;

use super::{RepoError, decode_error};

const COLUMNS: &str = "id, order_id, buyer_id, request_type, reason, details, status, \
    admin_response, admin_id, created_at, updated_at, resolved_at";

/// Creates the table, its index and its row-level policies when they were never
/// provisioned. Same file the migrator applies.
pub const BOOTSTRAP_TABLE_SQL: &str =
    include_str!("../../migrations/20250101000001_order_requests.sql");

#[derive(sqlx::FromRow)]
struct OrderRequestRow {
    id: String,
    order_id: String,
    buyer_id: String,
    request_type: String,
    reason: String,
    details: Option<String>,
    status: String,
    admin_response: Option<String>,
    admin_id: Option<String>,
    created_at: i64,
    updated_at: i64,
    resolved_at: Option<i64>,
}

impl TryFrom<OrderRequestRow> for OrderRequest {
    type Error = RepoError;

    fn try_from(row: OrderRequestRow) -> Result<Self, Self::Error> {
        Ok(OrderRequest {
            id: row.id,
            order_id: row.order_id,
            buyer_id: row.buyer_id,
            request_type: row
                .request_type
                .parse()
                .map_err(|e| decode_error("request_type", e))?,
            reason: row.reason,
            details: row.details,
            status: row.status.parse().map_err(|e| decode_error("status", e))?,
            admin_response: row.admin_response,
            admin_id: row.admin_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            resolved_at: row.resolved_at,
        })
    }
}

pub async fn insert(pool: &PgPool, request: &OrderRequest) -> Result<OrderRequest, RepoError> {
    let row: OrderRequestRow = sqlx::query_as(&format!(
        "INSERT INTO order_requests (id, order_id, buyer_id, request_type, reason, details, \
            status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {COLUMNS}"
    ))
    .bind(&request.id)
    .bind(&request.order_id)
    .bind(&request.buyer_id)
    .bind(request.request_type.as_str())
    .bind(&request.reason)
    .bind(&request.details)
    .bind(request.status.as_str())
    .bind(request.created_at)
    .bind(request.updated_at)
    .fetch_one(pool)
    .await?;
    row.try_into()
}

pub async fn list_for_order(pool: &PgPool, order_id: &str) -> Result<Vec<OrderRequest>, RepoError> {
    let rows: Vec<OrderRequestRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM order_requests WHERE order_id = $1 ORDER BY created_at DESC"
    ))
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(OrderRequest::try_from).collect()
}

/// Quote a string as a SQL literal. NUL bytes are dropped (Postgres rejects them in TEXT).
pub fn sql_literal(value: &str) -> String {
    let cleaned: String = value.chars().filter(|c| *c != '\0').collect();
    format!("'{}'", cleaned.replace('\'', "''"))
}

fn sql_optional(value: Option<&str>) -> String {
    value.map(sql_literal).unwrap_or_else(|| "NULL".to_string())
}

/// Self-contained INSERT with every value inlined as an escaped literal
pub fn raw_insert_statement(request: &OrderRequest) -> String {
    format!(
        "INSERT INTO order_requests (id, order_id, buyer_id, request_type, reason, details, \
            status, created_at, updated_at) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {})",
        sql_literal(&request.id),
        sql_literal(&request.order_id),
        sql_literal(&request.buyer_id),
        sql_literal(request.request_type.as_str()),
        sql_literal(&request.reason),
        sql_optional(request.details.as_deref()),
        sql_literal(request.status.as_str()),
        request.created_at,
        request.updated_at,
    )
}
