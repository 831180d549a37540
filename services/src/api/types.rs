//! Response representations for `/api` endpoints.

use serde::Serialize;

use crate::database::{IngredientRow, RecipeIngredientRow, RecipeRow, TagRow};
use crate::media::MediaStore;
use crate::users::StoredUser;

#[derive(Debug, Clone, Serialize)]
pub struct TagItem {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<TagRow> for TagItem {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngredientItem {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

impl From<IngredientRow> for IngredientItem {
    fn from(row: IngredientRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            measurement_unit: row.measurement_unit,
        }
    }
}

/// Public profile of a user as seen by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct UserItem {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserItem {
    pub fn new(user: &StoredUser, is_subscribed: bool) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeIngredientItem {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

impl From<RecipeIngredientRow> for RecipeIngredientItem {
    fn from(row: RecipeIngredientRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            measurement_unit: row.measurement_unit,
            amount: row.amount,
        }
    }
}

/// Full read representation of a recipe.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeItem {
    pub id: i64,
    pub tags: Vec<TagItem>,
    pub author: UserItem,
    pub ingredients: Vec<RecipeIngredientItem>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i16,
}

/// Compact recipe used by favorite/cart toggles and subscription listings.
#[derive(Debug, Clone, Serialize)]
pub struct ShortRecipeItem {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i16,
}

impl ShortRecipeItem {
    pub fn new(row: &RecipeRow, media: &MediaStore) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            image: media.url_for(&row.image),
            cooking_time: row.cooking_time,
        }
    }
}

/// An author the caller follows, with a preview of their recipes.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionItem {
    #[serde(flatten)]
    pub author: UserItem,
    pub recipes: Vec<ShortRecipeItem>,
    pub recipes_count: i64,
}
