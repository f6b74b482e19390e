//! Standalone service orders table

use rust_decimal::Decimal;
use shared::models::{ServiceDetails, ServiceOrder};
use sqlx::PgPool;
use sqlx::types::Json;

use super::{RepoError, decode_error};

const COLUMNS: &str = "id, order_id, buyer_id, buyer_email, buyer_company, service_type, \
    service_details, service_cost, total_amount, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ServiceOrderRow {
    id: i64,
    order_id: String,
    buyer_id: String,
    buyer_email: String,
    buyer_company: Option<String>,
    service_type: String,
    service_details: Json<ServiceDetails>,
    service_cost: Decimal,
    total_amount: Decimal,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ServiceOrderRow> for ServiceOrder {
    type Error = RepoError;

    fn try_from(row: ServiceOrderRow) -> Result<Self, Self::Error> {
        Ok(ServiceOrder {
            id: Some(row.id),
            order_id: row.order_id,
            buyer_id: row.buyer_id,
            buyer_email: row.buyer_email,
            buyer_company: row.buyer_company,
            service_type: row
                .service_type
                .parse()
                .map_err(|e| decode_error("service_type", e))?,
            service_details: row.service_details.0,
            service_cost: row.service_cost,
            total_amount: row.total_amount,
            status: row.status.parse().map_err(|e| decode_error("status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert(pool: &PgPool, order: &ServiceOrder) -> Result<ServiceOrder, RepoError> {
    let row: ServiceOrderRow = sqlx::query_as(&format!(
        "INSERT INTO service_orders (order_id, buyer_id, buyer_email, buyer_company, \
            service_type, service_details, service_cost, total_amount, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING {COLUMNS}"
    ))
    .bind(&order.order_id)
    .bind(&order.buyer_id)
    .bind(&order.buyer_email)
    .bind(&order.buyer_company)
    .bind(order.service_type.as_str())
    .bind(Json(&order.service_details))
    .bind(order.service_cost)
    .bind(order.total_amount)
    .bind(order.status.as_str())
    .bind(order.created_at)
    .bind(order.updated_at)
    .fetch_one(pool)
    .await?;
    row.try_into()
}

pub async fn list(pool: &PgPool, buyer_id: Option<&str>) -> Result<Vec<ServiceOrder>, RepoError> {
    let rows: Vec<ServiceOrderRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM service_orders
         WHERE ($1::TEXT IS NULL OR buyer_id = $1)
         ORDER BY created_at DESC"
    ))
    .bind(buyer_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(ServiceOrder::try_from).collect()
}

/// `None` spans every buyer
pub async fn list_between(
    pool: &PgPool,
    buyer_id: Option<&str>,
    start: i64,
    end: i64,
) -> Result<Vec<ServiceOrder>, RepoError> {
    let rows: Vec<ServiceOrderRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM service_orders
         WHERE created_at BETWEEN $1 AND $2
           AND ($3::TEXT IS NULL OR buyer_id = $3)"
    ))
    .bind(start)
    .bind(end)
    .bind(buyer_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(ServiceOrder::try_from).collect()
}
