//! Following other authors.

use axum::{
    Extension, Json,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
};
use axum_extra::extract::{Query, QueryRejection};
use serde::Deserialize;

use super::error::ApiError;
use super::pagination::{PageRequest, Paginated};
use super::present::subscription_item;
use super::types::SubscriptionItem;
use crate::config::Config;
use crate::database::SqlStorage;
use crate::state::AppState;
use crate::users::{RequireAuth, UserStorage};

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionsQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    /// Caps the embedded recipe list of each author.
    #[serde(default)]
    pub recipes_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipesLimitQuery {
    #[serde(default)]
    pub recipes_limit: Option<u32>,
}

/// GET /api/users/subscriptions/
#[tracing::instrument(skip_all, fields(user_id = auth.user_id()))]
pub async fn list<S, U>(
    State(state): State<AppState<S, U>>,
    Extension(config): Extension<Config>,
    OriginalUri(uri): OriginalUri,
    auth: RequireAuth,
    query: Result<Query<SubscriptionsQuery>, QueryRejection>,
) -> Result<Json<Paginated<SubscriptionItem>>, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let Query(query) = query?;
    let page = PageRequest::new(query.page, query.limit, config.page_size())?;

    let authors = state
        .user_storage
        .list_subscriptions(auth.user_id(), page.limit(), page.offset())
        .await?;

    let mut results = Vec::with_capacity(authors.items.len());
    for author in &authors.items {
        results.push(subscription_item(&state, auth.user_id(), author, query.recipes_limit).await?);
    }

    Ok(Json(Paginated::new(results, authors.total, page, &uri)))
}

/// POST /api/users/{id}/subscribe/
#[tracing::instrument(skip_all, fields(user_id = auth.user_id(), author_id = id))]
pub async fn subscribe<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<i64>,
    query: Result<Query<RecipesLimitQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<SubscriptionItem>), ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let Query(query) = query?;
    let author = state
        .user_storage
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if author.id == auth.user_id() {
        return Err(ApiError::BadRequest(
            "You cannot subscribe to yourself".to_owned(),
        ));
    }

    // A duplicate surfaces as AlreadySubscribed and maps to 400.
    state.user_storage.subscribe(auth.user_id(), author.id).await?;

    tracing::info!("Subscribed");
    let item = subscription_item(&state, auth.user_id(), &author, query.recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /api/users/{id}/subscribe/
#[tracing::instrument(skip_all, fields(user_id = auth.user_id(), author_id = id))]
pub async fn unsubscribe<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    if state.user_storage.get_user(id).await?.is_none() {
        return Err(ApiError::not_found("User"));
    }

    if state.user_storage.unsubscribe(auth.user_id(), id).await? {
        tracing::info!("Unsubscribed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::BadRequest(
            "You are not subscribed to this user".to_owned(),
        ))
    }
}
