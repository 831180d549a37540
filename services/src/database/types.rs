//! Row and input types shared by the storage implementations.

use chrono::{DateTime, Utc};
use std::fmt::Display;

/// Bounds for `recipes.cooking_time` and `recipe_ingredients.amount`.
pub const MIN_QUANTITY: i16 = 1;
pub const MAX_QUANTITY: i16 = 500;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct TagCreate {
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IngredientRow {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientCreate {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub text: String,
    pub cooking_time: i16,
    /// Media key of the recipe image.
    pub image: String,
    pub created_at: DateTime<Utc>,
}

/// One ingredient of a recipe joined with its amount.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RecipeIngredientRow {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

/// A recipe together with its tag set and ingredient join rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRecord {
    pub recipe: RecipeRow,
    pub tags: Vec<TagRow>,
    pub ingredients: Vec<RecipeIngredientRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient_id: i64,
    pub amount: i16,
}

/// Input for creating a recipe.
#[derive(Debug, Clone)]
pub struct RecipeCreate {
    pub author_id: i64,
    pub name: String,
    pub text: String,
    pub cooking_time: i16,
    pub image: String,
    pub ingredients: Vec<IngredientAmount>,
    pub tag_ids: Vec<i64>,
}

/// Changes applied by a recipe update.
///
/// Scalar fields left as `None` keep their value; the ingredient rows and
/// the tag set are always replaced.
#[derive(Debug, Clone)]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i16>,
    pub image: Option<String>,
    pub ingredients: Vec<IngredientAmount>,
    pub tag_ids: Vec<i64>,
}

/// Filters and window for listing recipes.
#[derive(Debug, Clone, Default)]
pub struct RecipesListParams {
    pub author_id: Option<i64>,
    /// Matches recipes carrying any of these tag slugs.
    pub tag_slugs: Vec<String>,
    pub favorited_by: Option<i64>,
    pub in_cart_of: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

/// A window of rows plus the total number of rows matching the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// The two user→recipe join tables with identical shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeRelation {
    Favorite,
    Cart,
}

impl RecipeRelation {
    pub fn table(self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "favorites",
            RecipeRelation::Cart => "shopping_cart",
        }
    }

    pub fn already_present_message(self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is already in favorites",
            RecipeRelation::Cart => "Recipe is already in the shopping cart",
        }
    }

    pub fn absent_message(self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is not in favorites",
            RecipeRelation::Cart => "Recipe is not in the shopping cart",
        }
    }
}

impl Display for RecipeRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipeRelation::Favorite => write!(f, "favorite"),
            RecipeRelation::Cart => write!(f, "shopping_cart"),
        }
    }
}

/// One line of the aggregated shopping list.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}
