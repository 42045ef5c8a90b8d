use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::response::{success, Envelope};
use crate::state::AppState;
use crate::users::dto::PublicUser;
use crate::users::repo as users_repo;

use super::dto::{
    ClassifyData, CropCount, DeleteHistoryRequest, DiseaseCount, HistoryDetails, HistoryItem,
    HistoryListData, HistoryQuery, PaginationMeta, StatsData, StatsQuery,
};
use super::repo;
use super::service::{classify_image, ClassifyRequest};

const MAX_LIMIT: i64 = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/classify", post(classify))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
        .route("/history", get(list_history))
        .route(
            "/classification/:id",
            get(get_history).delete(delete_history),
        )
        .route("/stats", get(get_stats))
        .route("/inference/health", get(inference_health))
        .route("/inference/models", get(inference_models))
}

// --- handlers ---

/// POST /api/classify (multipart: image file, email, optional cropType)
#[instrument(skip(state, mp))]
pub async fn classify(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<Json<Envelope<ClassifyData>>, ApiError> {
    let mut image: Option<(Bytes, String, String)> = None;
    let mut email: Option<String> = None;
    let mut crop_type: Option<String> = None;

    while let Ok(Some(field)) = mp.next_field().await {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload".into());
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field.bytes().await.map_err(|e| {
                    warn!(error = %e, "failed to read image field");
                    ApiError::InvalidInput("failed to read image upload".into())
                })?;
                image = Some((data, filename, content_type));
            }
            Some("email") => {
                email = field.text().await.ok();
            }
            Some("cropType") => {
                crop_type = field.text().await.ok().filter(|s| !s.trim().is_empty());
            }
            _ => {}
        }
    }

    let (bytes, filename, content_type) =
        image.ok_or_else(|| ApiError::InvalidInput("no image file provided".into()))?;

    let data = classify_image(
        &state,
        ClassifyRequest {
            bytes,
            filename,
            content_type,
            email: email.unwrap_or_default(),
            crop_type,
        },
    )
    .await?;

    Ok(success(data))
}

/// GET /api/history?email=&page=&limit= — newest first. An unknown email is
/// an empty history, not an error.
#[instrument(skip(state))]
pub async fn list_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Envelope<HistoryListData>>, ApiError> {
    let page = q.page.max(1);
    let limit = q.limit.clamp(1, MAX_LIMIT);
    let email = q.email.trim().to_lowercase();

    let Some(user) = users_repo::find_by_email(&state.db, &email).await? else {
        return Ok(success(HistoryListData {
            history: Vec::new(),
            pagination: PaginationMeta::new(page, limit, 0),
        }));
    };

    let total = repo::count_by_user(&state.db, user.id).await?;
    let records = repo::list_by_user(&state.db, user.id, limit, (page - 1) * limit).await?;

    Ok(success(HistoryListData {
        history: records.into_iter().map(HistoryItem::from).collect(),
        pagination: PaginationMeta::new(page, limit, total),
    }))
}

/// GET /api/classification/:id
#[instrument(skip(state))]
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<HistoryDetails>>, ApiError> {
    let record = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("classification record".into()))?;
    let user = users_repo::find_by_id(&state.db, record.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user".into()))?;

    Ok(success(HistoryDetails {
        user: PublicUser::from(&user),
        record: HistoryItem::from(record),
    }))
}

/// GET /api/stats?email=
#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
    Query(q): Query<StatsQuery>,
) -> Result<Json<Envelope<StatsData>>, ApiError> {
    let email = q.email.trim().to_lowercase();
    let Some(user) = users_repo::find_by_email(&state.db, &email).await? else {
        return Ok(success(StatsData::empty()));
    };

    let total_scans = repo::count_by_user(&state.db, user.id).await?;
    let disease_distribution = repo::disease_distribution(&state.db, user.id)
        .await?
        .into_iter()
        .map(|(disease, count)| DiseaseCount { disease, count })
        .collect();
    let crop_distribution = repo::crop_distribution(&state.db, user.id)
        .await?
        .into_iter()
        .map(|(crop_type, count)| CropCount { crop_type, count })
        .collect();
    let recent_scans = repo::list_by_user(&state.db, user.id, 5, 0)
        .await?
        .into_iter()
        .map(HistoryItem::from)
        .collect();

    Ok(success(StatsData {
        total_scans,
        disease_distribution,
        crop_distribution,
        recent_scans,
    }))
}

/// DELETE /api/classification/:id, body {email}. Ownership is a plain value
/// comparison against the record owner's email; there is no auth layer.
/// Removes the row only, the stored image stays.
#[instrument(skip(state, body))]
pub async fn delete_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DeleteHistoryRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let record = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("classification record".into()))?;
    let owner = users_repo::find_by_id(&state.db, record.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user".into()))?;

    if !owner.email.eq_ignore_ascii_case(body.email.trim()) {
        warn!(record_id = %id, "delete rejected, email does not match owner");
        return Err(ApiError::Forbidden(
            "record does not belong to this user".into(),
        ));
    }

    repo::delete(&state.db, id).await?;
    info!(record_id = %id, user_id = %owner.id, "history record deleted");
    Ok(success(json!({ "id": id })))
}

/// GET /api/inference/health — pass-through liveness of the inference service.
#[instrument(skip(state))]
pub async fn inference_health(
    State(state): State<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let healthy = state.inference.health_check().await;
    Ok(success(json!({ "healthy": healthy })))
}

/// GET /api/inference/models — pass-through model list.
#[instrument(skip(state))]
pub async fn inference_models(
    State(state): State<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let models = state.inference.list_models().await?;
    Ok(success(models))
}
