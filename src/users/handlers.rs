use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::response::{success, Envelope};
use crate::state::AppState;

use super::dto::{SearchQuery, UpdateUserRequest};
use super::repo::{self, User};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/search", get(search_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<User>>>, ApiError> {
    let users = repo::list(&state.db).await?;
    Ok(success(users))
}

#[instrument(skip(state))]
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Envelope<Vec<User>>>, ApiError> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(ApiError::InvalidInput("search query required".into()));
    }
    let users = repo::search(&state.db, q).await?;
    Ok(success(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<User>>, ApiError> {
    let user = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user".into()))?;
    Ok(success(user))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<Envelope<User>>, ApiError> {
    if body.full_name.is_none() && body.phone_number.is_none() {
        return Err(ApiError::InvalidInput("nothing to update".into()));
    }

    let user = repo::update(
        &state.db,
        id,
        body.full_name.as_deref(),
        body.phone_number.as_deref(),
    )
    .await
    .map_err(|e| {
        warn!(error = %e, %id, "user update failed");
        ApiError::from(e)
    })?
    .ok_or_else(|| ApiError::NotFound("user".into()))?;

    info!(user_id = %user.id, "user updated");
    Ok(success(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let deleted = repo::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("user".into()));
    }
    // History rows go with the user via ON DELETE CASCADE.
    info!(user_id = %id, "user deleted");
    Ok(success(json!({ "id": id })))
}
