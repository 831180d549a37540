//! Handlers for `/api/ingredients/*`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::{Query, QueryRejection};
use serde::Deserialize;

use super::error::ApiError;
use super::types::IngredientItem;
use crate::database::SqlStorage;
use crate::state::AppState;
use crate::users::UserStorage;

#[derive(Debug, Default, Deserialize)]
pub struct IngredientsQuery {
    /// Case-insensitive name prefix.
    #[serde(default)]
    pub name: Option<String>,
}

/// List ingredients, optionally filtered by name prefix. Not paginated.
///
/// GET /api/ingredients/?name=<prefix>
pub async fn list<S, U>(
    State(state): State<AppState<S, U>>,
    query: Result<Query<IngredientsQuery>, QueryRejection>,
) -> impl IntoResponse
where
    S: SqlStorage,
    U: UserStorage,
{
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    let prefix = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty());

    match state.sql_storage.ingredients_list(prefix).await {
        Ok(rows) => {
            let items: Vec<IngredientItem> = rows.into_iter().map(IngredientItem::from).collect();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to list ingredients: {:?}", e);
            ApiError::from(e).into_response()
        }
    }
}

/// GET /api/ingredients/{id}/
pub async fn get<S, U>(
    State(state): State<AppState<S, U>>,
    Path(id): Path<i64>,
) -> impl IntoResponse
where
    S: SqlStorage,
    U: UserStorage,
{
    match state.sql_storage.ingredients_get(id).await {
        Ok(Some(row)) => (StatusCode::OK, Json(IngredientItem::from(row))).into_response(),
        Ok(None) => ApiError::not_found("Ingredient").into_response(),
        Err(e) => {
            tracing::error!("Failed to get ingredient {id}: {:?}", e);
            ApiError::from(e).into_response()
        }
    }
}
