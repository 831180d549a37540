//! Handlers for `/api/recipes/` and `/api/recipes/{id}/`.

use axum::{
    Extension, Json,
    extract::{OriginalUri, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::{Query, QueryRejection};
use serde::Deserialize;

use super::error::{ApiError, FieldErrors};
use super::pagination::{PageRequest, Paginated};
use super::present::{recipe_item, recipe_items};
use super::recipe_payload::{RecipeWriteRequest, ValidatedRecipe, WriteMode};
use super::types::RecipeItem;
use crate::config::Config;
use crate::database::{
    RecipeCreate, RecipeRecord, RecipeUpdate, RecipesListParams, SqlStorage, SqlStorageError,
};
use crate::state::AppState;
use crate::users::{MaybeAuth, RequireAuth, UserStorage};

const NAME_TAKEN: &str = "You already have a recipe with this name.";

#[derive(Debug, Default, Deserialize)]
pub struct RecipesQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub author: Option<i64>,
    /// Repeatable: `?tags=breakfast&tags=lunch`.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorited: Option<String>,
    #[serde(default)]
    pub is_in_shopping_cart: Option<String>,
}

fn flag_set(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "True"))
}

/// List recipes, newest first.
///
/// GET /api/recipes/?page=&limit=&author=&tags=&is_favorited=&is_in_shopping_cart=
#[tracing::instrument(skip_all)]
pub async fn list<S, U>(
    State(state): State<AppState<S, U>>,
    Extension(config): Extension<Config>,
    OriginalUri(uri): OriginalUri,
    auth: MaybeAuth,
    query: Result<Query<RecipesQuery>, QueryRejection>,
) -> Result<Json<Paginated<RecipeItem>>, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let Query(query) = query?;
    let page = PageRequest::new(query.page, query.limit, config.page_size())?;
    let viewer_id = auth.user_id();

    if !query.tags.is_empty() {
        let known = state.sql_storage.tags_list().await?;
        let mut errors = FieldErrors::new();
        for slug in query.tags.iter().filter(|slug| !known.iter().any(|tag| &tag.slug == *slug)) {
            errors.add("tags", format!("Tag {slug} does not exist."));
        }
        errors.into_result()?;
    }

    // Personal filters only apply to signed-in callers.
    let params = RecipesListParams {
        author_id: query.author,
        tag_slugs: query.tags,
        favorited_by: viewer_id.filter(|_| flag_set(query.is_favorited.as_deref())),
        in_cart_of: viewer_id.filter(|_| flag_set(query.is_in_shopping_cart.as_deref())),
        limit: page.limit(),
        offset: page.offset(),
    };

    let found = state.sql_storage.recipes_list(params).await?;
    let results = recipe_items(&state, viewer_id, found.items).await?;
    Ok(Json(Paginated::new(results, found.total, page, &uri)))
}

/// GET /api/recipes/{id}/
pub async fn get<S, U>(
    State(state): State<AppState<S, U>>,
    auth: MaybeAuth,
    Path(id): Path<i64>,
) -> Result<Json<RecipeItem>, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let record = state
        .sql_storage
        .recipes_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))?;
    Ok(Json(recipe_item(&state, auth.user_id(), record).await?))
}

/// Shape checks plus the checks that need storage. Nothing is written.
async fn validate<S, U>(
    state: &AppState<S, U>,
    config: &Config,
    payload: RecipeWriteRequest,
    mode: WriteMode,
    author_id: i64,
    recipe_id: Option<i64>,
) -> Result<ValidatedRecipe, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let mut errors = FieldErrors::new();
    let recipe = payload.validate_shape(mode, config.max_image_bytes(), &mut errors);

    if !errors.has("ingredients") {
        let ids: Vec<i64> = recipe
            .ingredients
            .iter()
            .map(|item| item.ingredient_id)
            .collect();
        let known = state.sql_storage.ingredients_get_many(&ids).await?;
        for id in ids.iter().filter(|id| !known.iter().any(|row| row.id == **id)) {
            errors.add("ingredients", format!("Ingredient {id} does not exist."));
        }
    }

    if !errors.has("tags") {
        let known = state.sql_storage.tags_get_many(&recipe.tag_ids).await?;
        for id in recipe
            .tag_ids
            .iter()
            .filter(|id| !known.iter().any(|row| row.id == **id))
        {
            errors.add("tags", format!("Tag {id} does not exist."));
        }
    }

    if let Some(name) = &recipe.name
        && state
            .sql_storage
            .recipes_name_taken(author_id, name, recipe_id)
            .await?
    {
        errors.add("name", NAME_TAKEN);
    }

    errors.into_result()?;
    Ok(recipe)
}

/// A uniqueness race lost after validation passed.
fn write_conflict(err: SqlStorageError) -> ApiError {
    match err {
        SqlStorageError::Conflict(constraint) if constraint == "recipe_author_name" => {
            let mut errors = FieldErrors::new();
            errors.add("name", NAME_TAKEN);
            ApiError::Validation(errors)
        }
        other => other.into(),
    }
}

/// POST /api/recipes/
#[tracing::instrument(skip_all, fields(user_id = auth.user_id()))]
pub async fn create<S, U>(
    State(state): State<AppState<S, U>>,
    Extension(config): Extension<Config>,
    auth: RequireAuth,
    payload: Result<Json<RecipeWriteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let Json(payload) = payload?;
    let author_id = auth.user_id();
    let recipe = validate(&state, &config, payload, WriteMode::Create, author_id, None).await?;

    let (Some(name), Some(text), Some(cooking_time), Some(image)) =
        (recipe.name, recipe.text, recipe.cooking_time, recipe.image)
    else {
        return Err(ApiError::Internal(
            "validated recipe is missing required fields".to_owned(),
        ));
    };

    let image_key = state.media.save_recipe_image(image).await?;
    let created = state
        .sql_storage
        .recipes_create(RecipeCreate {
            author_id,
            name,
            text,
            cooking_time,
            image: image_key.clone(),
            ingredients: recipe.ingredients,
            tag_ids: recipe.tag_ids,
        })
        .await;

    let record = match created {
        Ok(record) => record,
        Err(e) => {
            state.media.remove(&image_key).await;
            return Err(write_conflict(e));
        }
    };

    tracing::info!(recipe_id = record.recipe.id, "Recipe created");
    let item = recipe_item(&state, Some(author_id), record).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Loads the recipe and checks that the caller wrote it.
async fn owned_recipe<S, U>(
    state: &AppState<S, U>,
    auth: &RequireAuth,
    id: i64,
) -> Result<RecipeRecord, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let record = state
        .sql_storage
        .recipes_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))?;
    if record.recipe.author_id != auth.user_id() {
        tracing::warn!(recipe_id = id, "Rejected change by non-author");
        return Err(ApiError::Forbidden(
            "Only the author can change this recipe".to_owned(),
        ));
    }
    Ok(record)
}

/// PATCH /api/recipes/{id}/
#[tracing::instrument(skip_all, fields(user_id = auth.user_id(), recipe_id = id))]
pub async fn update<S, U>(
    State(state): State<AppState<S, U>>,
    Extension(config): Extension<Config>,
    auth: RequireAuth,
    Path(id): Path<i64>,
    payload: Result<Json<RecipeWriteRequest>, JsonRejection>,
) -> Result<Json<RecipeItem>, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let existing = owned_recipe(&state, &auth, id).await?;
    let Json(payload) = payload?;
    let recipe = validate(
        &state,
        &config,
        payload,
        WriteMode::Update,
        auth.user_id(),
        Some(id),
    )
    .await?;

    let new_image = match recipe.image {
        Some(image) => Some(state.media.save_recipe_image(image).await?),
        None => None,
    };

    let updated = state
        .sql_storage
        .recipes_update(
            id,
            RecipeUpdate {
                name: recipe.name,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
                image: new_image.clone(),
                ingredients: recipe.ingredients,
                tag_ids: recipe.tag_ids,
            },
        )
        .await;

    let record = match updated {
        Ok(Some(record)) => record,
        failed => {
            if let Some(key) = &new_image {
                state.media.remove(key).await;
            }
            return Err(match failed {
                Err(e) => write_conflict(e),
                Ok(_) => ApiError::not_found("Recipe"),
            });
        }
    };

    if new_image.is_some() {
        state.media.remove(&existing.recipe.image).await;
    }

    Ok(Json(recipe_item(&state, Some(auth.user_id()), record).await?))
}

/// DELETE /api/recipes/{id}/
#[tracing::instrument(skip_all, fields(user_id = auth.user_id(), recipe_id = id))]
pub async fn delete<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    owned_recipe(&state, &auth, id).await?;

    match state.sql_storage.recipes_delete(id).await? {
        Some(row) => {
            state.media.remove(&row.image).await;
            tracing::info!("Recipe deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::not_found("Recipe")),
    }
}

#[cfg(test)]
mod tests {
    use super::flag_set;

    #[test]
    fn flags_accept_one_and_true() {
        assert!(flag_set(Some("1")));
        assert!(flag_set(Some("true")));
        assert!(!flag_set(Some("0")));
        assert!(!flag_set(None));
    }
}
