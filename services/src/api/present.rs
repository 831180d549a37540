//! Builds read representations that depend on who is asking.

use std::collections::HashMap;

use super::error::ApiError;
use super::types::{RecipeItem, ShortRecipeItem, SubscriptionItem, TagItem, UserItem};
use crate::database::{RecipeRecord, RecipeRelation, RecipesListParams, SqlStorage};
use crate::state::AppState;
use crate::users::{StoredUser, UserStorage};

/// Profile of `user` with `is_subscribed` computed for `viewer_id`.
pub async fn user_item<S, U>(
    state: &AppState<S, U>,
    viewer_id: Option<i64>,
    user: &StoredUser,
) -> Result<UserItem, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let is_subscribed = match viewer_id {
        Some(viewer_id) if viewer_id != user.id => {
            state.user_storage.is_subscribed(viewer_id, user.id).await?
        }
        _ => false,
    };
    Ok(UserItem::new(user, is_subscribed))
}

pub async fn recipe_item<S, U>(
    state: &AppState<S, U>,
    viewer_id: Option<i64>,
    record: RecipeRecord,
) -> Result<RecipeItem, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let mut items = recipe_items(state, viewer_id, vec![record]).await?;
    items
        .pop()
        .ok_or_else(|| ApiError::Internal("recipe presentation produced nothing".to_owned()))
}

/// Presents a page of recipes, looking each author up once.
pub async fn recipe_items<S, U>(
    state: &AppState<S, U>,
    viewer_id: Option<i64>,
    records: Vec<RecipeRecord>,
) -> Result<Vec<RecipeItem>, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let mut authors: HashMap<i64, UserItem> = HashMap::new();
    let mut items = Vec::with_capacity(records.len());

    for record in records {
        let author_id = record.recipe.author_id;
        let author = match authors.get(&author_id) {
            Some(author) => author.clone(),
            None => {
                let user = state
                    .user_storage
                    .get_user(author_id)
                    .await?
                    .ok_or_else(|| {
                        ApiError::Internal(format!("author {author_id} of a recipe is missing"))
                    })?;
                let author = user_item(state, viewer_id, &user).await?;
                authors.insert(author_id, author.clone());
                author
            }
        };

        let recipe_id = record.recipe.id;
        let (is_favorited, is_in_shopping_cart) = match viewer_id {
            Some(viewer_id) => (
                state
                    .sql_storage
                    .relation_contains(RecipeRelation::Favorite, viewer_id, recipe_id)
                    .await?,
                state
                    .sql_storage
                    .relation_contains(RecipeRelation::Cart, viewer_id, recipe_id)
                    .await?,
            ),
            None => (false, false),
        };

        let RecipeRecord {
            recipe,
            tags,
            ingredients,
        } = record;
        items.push(RecipeItem {
            id: recipe.id,
            tags: tags.into_iter().map(TagItem::from).collect(),
            author,
            ingredients: ingredients.into_iter().map(Into::into).collect(),
            is_favorited,
            is_in_shopping_cart,
            name: recipe.name,
            image: state.media.url_for(&recipe.image),
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        });
    }

    Ok(items)
}

/// An author followed by `viewer_id` with up to `recipes_limit` of their
/// newest recipes (all of them when `None`).
pub async fn subscription_item<S, U>(
    state: &AppState<S, U>,
    viewer_id: i64,
    author: &StoredUser,
    recipes_limit: Option<u32>,
) -> Result<SubscriptionItem, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let page = state
        .sql_storage
        .recipes_list(RecipesListParams {
            author_id: Some(author.id),
            limit: recipes_limit.map(i64::from).unwrap_or(i64::MAX),
            offset: 0,
            ..Default::default()
        })
        .await?;

    Ok(SubscriptionItem {
        author: user_item(state, Some(viewer_id), author).await?,
        recipes: page
            .items
            .iter()
            .map(|record| ShortRecipeItem::new(&record.recipe, &state.media))
            .collect(),
        recipes_count: page.total,
    })
}
