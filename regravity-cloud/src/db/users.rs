//! User profiles (written by the identity provider's signup hook)

use shared::models::UserProfile;
use sqlx::PgPool;

use super::{RepoError, decode_error};

const COLUMNS: &str =
    "user_id, public_id, email, full_name, company_name, phone, wechat, country, role, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    public_id: String,
    email: String,
    full_name: Option<String>,
    company_name: Option<String>,
    phone: Option<String>,
    wechat: Option<String>,
    country: Option<String>,
    role: String,
    created_at: i64,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            user_id: row.user_id,
            public_id: row.public_id,
            email: row.email,
            full_name: row.full_name,
            company_name: row.company_name,
            phone: row.phone,
            wechat: row.wechat,
            country: row.country,
            role: row.role.parse().map_err(|e| decode_error("role", e))?,
            created_at: row.created_at,
        })
    }
}

pub async fn find(pool: &PgPool, id: &str) -> Result<Option<UserProfile>, RepoError> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM users WHERE user_id = $1 OR public_id = $1 LIMIT 1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(UserProfile::try_from).transpose()
}

pub async fn list_between(
    pool: &PgPool,
    start: i64,
    end: i64,
) -> Result<Vec<UserProfile>, RepoError> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM users WHERE created_at BETWEEN $1 AND $2 ORDER BY created_at"
    ))
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(UserProfile::try_from).collect()
}
