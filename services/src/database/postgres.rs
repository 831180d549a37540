use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::{
    IngredientAmount, IngredientCreate, IngredientRow, Page, RecipeCreate, RecipeIngredientRow,
    RecipeRecord, RecipeRelation, RecipeRow, RecipeUpdate, RecipesListParams, ShoppingListItem,
    SqlStorage, SqlStorageError, TagCreate, TagRow,
};

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.text, r.cooking_time, r.image, r.created_at";

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads tags and ingredient rows for `recipes`, keeping their order.
    async fn attach_details(
        &self,
        recipes: Vec<RecipeRow>,
    ) -> Result<Vec<RecipeRecord>, SqlStorageError> {
        if recipes.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = recipes.iter().map(|recipe| recipe.id).collect();

        let tag_links: Vec<RecipeTagLink> = sqlx::query_as(
            r#"
            SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
            FROM recipe_tags rt
            JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = ANY($1)
            ORDER BY t.id
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let ingredient_links: Vec<RecipeIngredientLink> = sqlx::query_as(
            r#"
            SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY ri.id
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<i64, Vec<TagRow>> = HashMap::new();
        for link in tag_links {
            tags.entry(link.recipe_id).or_default().push(link.tag);
        }
        let mut ingredients: HashMap<i64, Vec<RecipeIngredientRow>> = HashMap::new();
        for link in ingredient_links {
            ingredients
                .entry(link.recipe_id)
                .or_default()
                .push(link.ingredient);
        }

        Ok(recipes
            .into_iter()
            .map(|recipe| RecipeRecord {
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                recipe,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct RecipeTagLink {
    recipe_id: i64,
    #[sqlx(flatten)]
    tag: TagRow,
}

#[derive(sqlx::FromRow)]
struct RecipeIngredientLink {
    recipe_id: i64,
    #[sqlx(flatten)]
    ingredient: RecipeIngredientRow,
}

fn push_recipe_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &RecipesListParams) {
    builder.push(" WHERE TRUE");
    if let Some(author_id) = params.author_id {
        builder.push(" AND r.author_id = ").push_bind(author_id);
    }
    if !params.tag_slugs.is_empty() {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(params.tag_slugs.clone())
            .push("))");
    }
    if let Some(user_id) = params.favorited_by {
        builder
            .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(user_id) = params.in_cart_of {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
            )
            .push_bind(user_id)
            .push(")");
    }
}

async fn insert_recipe_links(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    ingredients: &[IngredientAmount],
    tag_ids: &[i64],
) -> Result<(), sqlx::Error> {
    let ingredient_ids: Vec<i64> = ingredients.iter().map(|item| item.ingredient_id).collect();
    let amounts: Vec<i16> = ingredients.iter().map(|item| item.amount).collect();

    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, u.ingredient_id, u.amount
        FROM UNNEST($2::BIGINT[], $3::SMALLINT[]) WITH ORDINALITY AS u(ingredient_id, amount, ord)
        ORDER BY u.ord
        "#,
    )
    .bind(recipe_id)
    .bind(&ingredient_ids[..])
    .bind(&amounts[..])
    .execute(&mut **tx)
    .await?;

    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::BIGINT[])")
        .bind(recipe_id)
        .bind(tag_ids)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Escapes `LIKE` wildcards so user input only matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl SqlStorage for PgStorage {
    async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn tags_list(&self) -> Result<Vec<TagRow>, SqlStorageError> {
        let rows = sqlx::query_as("SELECT id, name, color, slug FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn tags_get(&self, id: i64) -> Result<Option<TagRow>, SqlStorageError> {
        let row = sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn tags_get_many(&self, ids: &[i64]) -> Result<Vec<TagRow>, SqlStorageError> {
        let rows =
            sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = ANY($1) ORDER BY id")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn tags_create(&self, input: TagCreate) -> Result<TagRow, SqlStorageError> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO tags (name, color, slug)
            VALUES ($1, $2, $3)
            RETURNING id, name, color, slug
            "#,
        )
        .bind(input.name)
        .bind(input.color)
        .bind(input.slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn ingredients_list(
        &self,
        name_prefix: Option<&str>,
    ) -> Result<Vec<IngredientRow>, SqlStorageError> {
        let rows = match name_prefix {
            Some(prefix) => {
                sqlx::query_as(
                    r#"
                    SELECT id, name, measurement_unit FROM ingredients
                    WHERE lower(name) LIKE lower($1) || '%'
                    ORDER BY name, id
                    "#,
                )
                .bind(escape_like(prefix))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients ORDER BY name, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn ingredients_get(&self, id: i64) -> Result<Option<IngredientRow>, SqlStorageError> {
        let row = sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn ingredients_get_many(
        &self,
        ids: &[i64],
    ) -> Result<Vec<IngredientRow>, SqlStorageError> {
        let rows = sqlx::query_as(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn ingredients_insert_many(
        &self,
        input: Vec<IngredientCreate>,
    ) -> Result<u64, SqlStorageError> {
        let (names, units): (Vec<String>, Vec<String>) = input
            .into_iter()
            .map(|item| (item.name, item.measurement_unit))
            .unzip();

        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (name, measurement_unit)
            SELECT * FROM UNNEST($1::TEXT[], $2::TEXT[])
            ON CONFLICT ON CONSTRAINT ingredient_name_unit DO NOTHING
            "#,
        )
        .bind(&names[..])
        .bind(&units[..])
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn recipes_list(
        &self,
        params: RecipesListParams,
    ) -> Result<Page<RecipeRecord>, SqlStorageError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes r");
        push_recipe_filters(&mut count, &params);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {RECIPE_COLUMNS} FROM recipes r"));
        push_recipe_filters(&mut select, &params);
        select
            .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);
        let recipes: Vec<RecipeRow> = select
            .build_query_as::<RecipeRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: self.attach_details(recipes).await?,
            total,
        })
    }

    async fn recipes_get(&self, id: i64) -> Result<Option<RecipeRecord>, SqlStorageError> {
        let row: Option<RecipeRow> =
            sqlx::query_as(&format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(self.attach_details(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn recipes_name_taken(
        &self,
        author_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, SqlStorageError> {
        let taken = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM recipes
                WHERE author_id = $1 AND name = $2 AND ($3::BIGINT IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(author_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn recipes_create(&self, input: RecipeCreate) -> Result<RecipeRecord, SqlStorageError> {
        let mut tx = self.pool.begin().await?;

        let row: RecipeRow = sqlx::query_as(
            r#"
            INSERT INTO recipes (author_id, name, text, cooking_time, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, author_id, name, text, cooking_time, image, created_at
            "#,
        )
        .bind(input.author_id)
        .bind(&input.name)
        .bind(&input.text)
        .bind(input.cooking_time)
        .bind(&input.image)
        .fetch_one(&mut *tx)
        .await?;

        insert_recipe_links(&mut tx, row.id, &input.ingredients, &input.tag_ids).await?;
        tx.commit().await?;

        self.attach_details(vec![row])
            .await?
            .pop()
            .ok_or_else(|| SqlStorageError::Db("created recipe vanished".to_owned()))
    }

    async fn recipes_update(
        &self,
        id: i64,
        changes: RecipeUpdate,
    ) -> Result<Option<RecipeRecord>, SqlStorageError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE recipes SET
                name = COALESCE($2, name),
                text = COALESCE($3, text),
                cooking_time = COALESCE($4, cooking_time),
                image = COALESCE($5, image)
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.text)
        .bind(changes.cooking_time)
        .bind(changes.image)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }

        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_recipe_links(&mut tx, id, &changes.ingredients, &changes.tag_ids).await?;

        tx.commit().await?;
        self.recipes_get(id).await
    }

    async fn recipes_delete(&self, id: i64) -> Result<Option<RecipeRow>, SqlStorageError> {
        let row = sqlx::query_as(
            r#"
            DELETE FROM recipes WHERE id = $1
            RETURNING id, author_id, name, text, cooking_time, image, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn relation_add(
        &self,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<(), SqlStorageError> {
        let sql = format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2)",
            relation.table()
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn relation_remove(
        &self,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<bool, SqlStorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            relation.table()
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn relation_contains(
        &self,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<bool, SqlStorageError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = $1 AND recipe_id = $2)",
            relation.table()
        );
        let exists = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(recipe_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn shopping_list(&self, user_id: i64) -> Result<Vec<ShoppingListItem>, SqlStorageError> {
        let rows = sqlx::query_as(
            r#"
            SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS total_amount
            FROM shopping_cart c
            JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE c.user_id = $1
            GROUP BY i.name, i.measurement_unit
            ORDER BY i.name COLLATE "C", i.measurement_unit COLLATE "C"
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
