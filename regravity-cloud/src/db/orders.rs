//! Trade orders table

use rust_decimal::Decimal;
use shared::models::{Order, SelectedServices};
use sqlx::PgPool;
use sqlx::types::Json;

use super::{OrderScope, RepoError, decode_error};

const COLUMNS: &str = "id, order_id, buyer_id, buyer_email, buyer_company, supplier_id, \
    supplier_name, supplier_email, supplier_phone, supplier_wechat, product_description, \
    deal_amount, supplier_bank_account, selected_services, service_cost, total_amount, \
    status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_id: String,
    buyer_id: String,
    buyer_email: String,
    buyer_company: Option<String>,
    supplier_id: Option<String>,
    supplier_name: String,
    supplier_email: Option<String>,
    supplier_phone: Option<String>,
    supplier_wechat: Option<String>,
    product_description: String,
    deal_amount: Decimal,
    supplier_bank_account: Option<String>,
    selected_services: Json<SelectedServices>,
    service_cost: Decimal,
    total_amount: Decimal,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepoError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: Some(row.id),
            order_id: row.order_id,
            buyer_id: row.buyer_id,
            buyer_email: row.buyer_email,
            buyer_company: row.buyer_company,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            supplier_email: row.supplier_email,
            supplier_phone: row.supplier_phone,
            supplier_wechat: row.supplier_wechat,
            product_description: row.product_description,
            deal_amount: row.deal_amount,
            supplier_bank_account: row.supplier_bank_account,
            selected_services: row.selected_services.0,
            service_cost: row.service_cost,
            total_amount: row.total_amount,
            status: row.status.parse().map_err(|e| decode_error("status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert(rows: Vec<OrderRow>) -> Result<Vec<Order>, RepoError> {
    rows.into_iter().map(Order::try_from).collect()
}

pub async fn insert(pool: &PgPool, order: &Order) -> Result<Order, RepoError> {
    let row: OrderRow = sqlx::query_as(&format!(
        "INSERT INTO orders (order_id, buyer_id, buyer_email, buyer_company, supplier_id, \
            supplier_name, supplier_email, supplier_phone, supplier_wechat, product_description, \
            deal_amount, supplier_bank_account, selected_services, service_cost, total_amount, \
            status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
         RETURNING {COLUMNS}"
    ))
    .bind(&order.order_id)
    .bind(&order.buyer_id)
    .bind(&order.buyer_email)
    .bind(&order.buyer_company)
    .bind(&order.supplier_id)
    .bind(&order.supplier_name)
    .bind(&order.supplier_email)
    .bind(&order.supplier_phone)
    .bind(&order.supplier_wechat)
    .bind(&order.product_description)
    .bind(order.deal_amount)
    .bind(&order.supplier_bank_account)
    .bind(Json(&order.selected_services))
    .bind(order.service_cost)
    .bind(order.total_amount)
    .bind(order.status.as_str())
    .bind(order.created_at)
    .bind(order.updated_at)
    .fetch_one(pool)
    .await?;
    row.try_into()
}

pub async fn find_by_order_id(pool: &PgPool, order_id: &str) -> Result<Option<Order>, RepoError> {
    let row: Option<OrderRow> =
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM orders WHERE order_id = $1"))
            .bind(order_id)
            .fetch_optional(pool)
            .await?;
    row.map(Order::try_from).transpose()
}

pub async fn list(pool: &PgPool, scope: &OrderScope) -> Result<Vec<Order>, RepoError> {
    let rows: Vec<OrderRow> = match scope {
        OrderScope::Buyer(id) => {
            sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC"
            ))
            .bind(id)
            .fetch_all(pool)
            .await?
        }
        OrderScope::Supplier(id) => {
            sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM orders WHERE supplier_id = $1 ORDER BY created_at DESC"
            ))
            .bind(id)
            .fetch_all(pool)
            .await?
        }
        OrderScope::All => {
            sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM orders ORDER BY created_at DESC"
            ))
            .fetch_all(pool)
            .await?
        }
    };
    convert(rows)
}

pub async fn list_between(
    pool: &PgPool,
    scope: &OrderScope,
    start: i64,
    end: i64,
) -> Result<Vec<Order>, RepoError> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM orders
         WHERE created_at BETWEEN $1 AND $2
           AND ($3::TEXT IS NULL OR buyer_id = $3)
           AND ($4::TEXT IS NULL OR supplier_id = $4)
         ORDER BY created_at"
    ))
    .bind(start)
    .bind(end)
    .bind(scope.buyer_id())
    .bind(scope.supplier_id())
    .fetch_all(pool)
    .await?;
    convert(rows)
}
