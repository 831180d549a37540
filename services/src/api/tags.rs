//! Handlers for `/api/tags/*`. Read-only; tags are loaded with `foodgram-import`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::error::ApiError;
use super::types::TagItem;
use crate::database::SqlStorage;
use crate::state::AppState;
use crate::users::UserStorage;

/// List all tags.
///
/// GET /api/tags/
pub async fn list<S, U>(State(state): State<AppState<S, U>>) -> impl IntoResponse
where
    S: SqlStorage,
    U: UserStorage,
{
    match state.sql_storage.tags_list().await {
        Ok(rows) => {
            let items: Vec<TagItem> = rows.into_iter().map(TagItem::from).collect();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to list tags: {:?}", e);
            ApiError::from(e).into_response()
        }
    }
}

/// GET /api/tags/{id}/
pub async fn get<S, U>(
    State(state): State<AppState<S, U>>,
    Path(id): Path<i64>,
) -> impl IntoResponse
where
    S: SqlStorage,
    U: UserStorage,
{
    match state.sql_storage.tags_get(id).await {
        Ok(Some(row)) => (StatusCode::OK, Json(TagItem::from(row))).into_response(),
        Ok(None) => ApiError::not_found("Tag").into_response(),
        Err(e) => {
            tracing::error!("Failed to get tag {id}: {:?}", e);
            ApiError::from(e).into_response()
        }
    }
}
