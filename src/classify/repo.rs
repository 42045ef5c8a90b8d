use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One persisted classification event. Never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub disease: String,
    pub crop_type: Option<String>,
    pub model_response: String,
    pub genai_response: String,
    pub created_at: OffsetDateTime,
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    image_url: &str,
    disease: &str,
    crop_type: Option<&str>,
    model_response: &str,
    genai_response: &str,
) -> Result<HistoryRecord, sqlx::Error> {
    sqlx::query_as::<_, HistoryRecord>(
        r#"
        INSERT INTO history (user_id, image_url, disease, crop_type, model_response, genai_response)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, image_url, disease, crop_type, model_response, genai_response, created_at
        "#,
    )
    .bind(user_id)
    .bind(image_url)
    .bind(disease)
    .bind(crop_type)
    .bind(model_response)
    .bind(genai_response)
    .fetch_one(db)
    .await
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<HistoryRecord>, sqlx::Error> {
    sqlx::query_as::<_, HistoryRecord>(
        r#"
        SELECT id, user_id, image_url, disease, crop_type, model_response, genai_response, created_at
        FROM history
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn count_by_user(db: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM history WHERE user_id = $1"#)
        .bind(user_id)
        .fetch_one(db)
        .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<HistoryRecord>, sqlx::Error> {
    sqlx::query_as::<_, HistoryRecord>(
        r#"
        SELECT id, user_id, image_url, disease, crop_type, model_response, genai_response, created_at
        FROM history
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Deletes the database row only; the stored image blob stays behind.
pub async fn delete(db: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM history WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

pub async fn disease_distribution(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT disease, COUNT(*)
        FROM history
        WHERE user_id = $1
        GROUP BY disease
        ORDER BY COUNT(*) DESC, disease ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn crop_distribution(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT crop_type, COUNT(*)
        FROM history
        WHERE user_id = $1 AND crop_type IS NOT NULL
        GROUP BY crop_type
        ORDER BY COUNT(*) DESC, crop_type ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}
