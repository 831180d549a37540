//! Recipe catalog persistence.
//!
//! [`SqlStorage`] is the seam between the HTTP handlers and the database.
//! [`PgStorage`] backs it with PostgreSQL; [`MockSqlStorage`] keeps everything
//! in memory for tests and enforces the same uniqueness rules.

mod mock;
mod postgres;
mod types;

pub use mock::MockSqlStorage;
pub use postgres::PgStorage;
pub use types::*;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;

/// Initialize a PostgreSQL connection pool
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new().connect(database_url).await?;

    tracing::info!("Database connection pool established");

    Ok(pool)
}

/// Apply the embedded migrations in `services/migrations`.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SqlStorageError {
    /// A uniqueness constraint rejected the write. Carries the constraint name.
    #[error("Conflict on {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Db(String),
}

impl From<sqlx::Error> for SqlStorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return SqlStorageError::Conflict(db_err.constraint().unwrap_or("unique").to_owned());
        }
        SqlStorageError::Db(err.to_string())
    }
}

pub trait SqlStorage: Clone + Send + Sync + 'static {
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    // ========================================================================
    // Tags
    // ========================================================================

    /// All tags ordered by id.
    fn tags_list(&self) -> impl Future<Output = Result<Vec<TagRow>, SqlStorageError>> + Send;

    fn tags_get(&self, id: i64)
    -> impl Future<Output = Result<Option<TagRow>, SqlStorageError>> + Send;

    /// The subset of `ids` that exist. Order is unspecified.
    fn tags_get_many(
        &self,
        ids: &[i64],
    ) -> impl Future<Output = Result<Vec<TagRow>, SqlStorageError>> + Send;

    /// Fails with [`SqlStorageError::Conflict`] when the slug is taken.
    fn tags_create(
        &self,
        input: TagCreate,
    ) -> impl Future<Output = Result<TagRow, SqlStorageError>> + Send;

    // ========================================================================
    // Ingredients
    // ========================================================================

    /// Ingredients ordered by name, optionally restricted to names starting
    /// with `name_prefix` (case-insensitive).
    fn ingredients_list(
        &self,
        name_prefix: Option<&str>,
    ) -> impl Future<Output = Result<Vec<IngredientRow>, SqlStorageError>> + Send;

    fn ingredients_get(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<IngredientRow>, SqlStorageError>> + Send;

    fn ingredients_get_many(
        &self,
        ids: &[i64],
    ) -> impl Future<Output = Result<Vec<IngredientRow>, SqlStorageError>> + Send;

    /// Bulk insert, skipping `(name, measurement_unit)` pairs that already
    /// exist. Returns how many rows were inserted.
    fn ingredients_insert_many(
        &self,
        input: Vec<IngredientCreate>,
    ) -> impl Future<Output = Result<u64, SqlStorageError>> + Send;

    // ========================================================================
    // Recipes
    // ========================================================================

    /// Recipes matching `params`, newest first.
    fn recipes_list(
        &self,
        params: RecipesListParams,
    ) -> impl Future<Output = Result<Page<RecipeRecord>, SqlStorageError>> + Send;

    fn recipes_get(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<RecipeRecord>, SqlStorageError>> + Send;

    /// Whether `author_id` already owns a recipe called `name`, ignoring
    /// `exclude_id` (the recipe being edited).
    fn recipes_name_taken(
        &self,
        author_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> impl Future<Output = Result<bool, SqlStorageError>> + Send;

    /// Inserts the recipe with its tag set and ingredient rows atomically.
    fn recipes_create(
        &self,
        input: RecipeCreate,
    ) -> impl Future<Output = Result<RecipeRecord, SqlStorageError>> + Send;

    /// Applies `changes` atomically. `None` when the recipe does not exist.
    fn recipes_update(
        &self,
        id: i64,
        changes: RecipeUpdate,
    ) -> impl Future<Output = Result<Option<RecipeRecord>, SqlStorageError>> + Send;

    /// Deletes the recipe and everything that references it.
    /// Returns the deleted row so its image can be released.
    fn recipes_delete(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<RecipeRow>, SqlStorageError>> + Send;

    // ========================================================================
    // Favorites and shopping cart
    // ========================================================================

    /// Fails with [`SqlStorageError::Conflict`] when the pair already exists.
    fn relation_add(
        &self,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> impl Future<Output = Result<(), SqlStorageError>> + Send;

    /// Returns whether a row was removed.
    fn relation_remove(
        &self,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> impl Future<Output = Result<bool, SqlStorageError>> + Send;

    fn relation_contains(
        &self,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> impl Future<Output = Result<bool, SqlStorageError>> + Send;

    /// Ingredient totals over every recipe in the user's cart, grouped by
    /// `(name, measurement_unit)` and ordered by name then unit.
    fn shopping_list(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<ShoppingListItem>, SqlStorageError>> + Send;
}
