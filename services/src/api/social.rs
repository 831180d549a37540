//! Favorite and shopping-cart toggles on `/api/recipes/{id}/…`.
//!
//! Both relations behave the same: POST adds the pair (400 when present),
//! DELETE removes it (400 when absent), a missing recipe is 404.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::error::ApiError;
use super::types::ShortRecipeItem;
use crate::database::{RecipeRelation, SqlStorage, SqlStorageError};
use crate::state::AppState;
use crate::users::{RequireAuth, UserStorage};

async fn add<S, U>(
    state: &AppState<S, U>,
    auth: &RequireAuth,
    relation: RecipeRelation,
    recipe_id: i64,
) -> Result<(StatusCode, Json<ShortRecipeItem>), ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let record = state
        .sql_storage
        .recipes_get(recipe_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))?;

    match state
        .sql_storage
        .relation_add(relation, auth.user_id(), recipe_id)
        .await
    {
        Ok(()) => {
            tracing::debug!(%relation, recipe_id, user_id = auth.user_id(), "Relation added");
            Ok((
                StatusCode::CREATED,
                Json(ShortRecipeItem::new(&record.recipe, &state.media)),
            ))
        }
        Err(SqlStorageError::Conflict(_)) => Err(ApiError::BadRequest(
            relation.already_present_message().to_owned(),
        )),
        Err(e) => Err(e.into()),
    }
}

async fn remove<S, U>(
    state: &AppState<S, U>,
    auth: &RequireAuth,
    relation: RecipeRelation,
    recipe_id: i64,
) -> Result<StatusCode, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    if state.sql_storage.recipes_get(recipe_id).await?.is_none() {
        return Err(ApiError::not_found("Recipe"));
    }

    if state
        .sql_storage
        .relation_remove(relation, auth.user_id(), recipe_id)
        .await?
    {
        tracing::debug!(%relation, recipe_id, user_id = auth.user_id(), "Relation removed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::BadRequest(relation.absent_message().to_owned()))
    }
}

/// POST /api/recipes/{id}/favorite/
pub async fn favorite_add<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ShortRecipeItem>), ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    add(&state, &auth, RecipeRelation::Favorite, id).await
}

/// DELETE /api/recipes/{id}/favorite/
pub async fn favorite_remove<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    remove(&state, &auth, RecipeRelation::Favorite, id).await
}

/// POST /api/recipes/{id}/shopping_cart/
pub async fn cart_add<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ShortRecipeItem>), ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    add(&state, &auth, RecipeRelation::Cart, id).await
}

/// DELETE /api/recipes/{id}/shopping_cart/
pub async fn cart_remove<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    remove(&state, &auth, RecipeRelation::Cart, id).await
}
