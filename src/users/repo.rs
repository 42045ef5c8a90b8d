use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub role: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Atomic insert-or-return-existing keyed by email. Concurrent first-time
/// requests for one email both get a row back; the unique index arbitrates.
pub async fn upsert_by_email(
    db: &PgPool,
    email: &str,
    full_name: &str,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, full_name)
        VALUES ($1, $2)
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING id, email, full_name, phone_number, role, is_active, created_at
        "#,
    )
    .bind(email)
    .bind(full_name)
    .fetch_one(db)
    .await
}

pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, full_name, phone_number, role, is_active, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, full_name, phone_number, role, is_active, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn list(db: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, full_name, phone_number, role, is_active, created_at
        FROM users
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn search(db: &PgPool, q: &str) -> Result<Vec<User>, sqlx::Error> {
    let pattern = format!("%{}%", q);
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, full_name, phone_number, role, is_active, created_at
        FROM users
        WHERE email ILIKE $1 OR full_name ILIKE $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(pattern)
    .fetch_all(db)
    .await
}

/// Partial update; absent fields keep their current value. Phone number
/// uniqueness violations surface as `sqlx::Error` for the 409 mapping.
pub async fn update(
    db: &PgPool,
    id: Uuid,
    full_name: Option<&str>,
    phone_number: Option<&str>,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET full_name    = COALESCE($2, full_name),
            phone_number = COALESCE($3, phone_number)
        WHERE id = $1
        RETURNING id, email, full_name, phone_number, role, is_active, created_at
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(phone_number)
    .fetch_optional(db)
    .await
}

/// Deleting a user cascades to their history rows (schema constraint).
pub async fn delete(db: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
