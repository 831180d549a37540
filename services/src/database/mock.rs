use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;

use super::{
    IngredientAmount, IngredientCreate, IngredientRow, Page, RecipeCreate, RecipeIngredientRow,
    RecipeRecord, RecipeRelation, RecipeRow, RecipeUpdate, RecipesListParams, ShoppingListItem,
    SqlStorage, SqlStorageError, TagCreate, TagRow,
};
use crate::shopping_list;

/// In-memory [`SqlStorage`] for tests.
///
/// Mirrors the database constraints the handlers rely on: unique tag slugs,
/// unique `(author, name)` recipes, unique ingredient rows per recipe, unique
/// favorite/cart pairs and cascading deletes.
#[derive(Clone, Default)]
pub struct MockSqlStorage {
    state: Arc<RwLock<MockState>>,
    disconnected: bool,
}

#[derive(Default)]
struct MockState {
    tags: BTreeMap<i64, TagRow>,
    ingredients: BTreeMap<i64, IngredientRow>,
    recipes: BTreeMap<i64, MockRecipe>,
    relations: HashSet<(RecipeRelation, i64, i64)>,
    next_tag_id: i64,
    next_ingredient_id: i64,
    next_recipe_id: i64,
}

struct MockRecipe {
    row: RecipeRow,
    tag_ids: Vec<i64>,
    ingredients: Vec<IngredientAmount>,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl MockState {
    fn record(&self, recipe: &MockRecipe) -> RecipeRecord {
        let mut tags: Vec<TagRow> = recipe
            .tag_ids
            .iter()
            .filter_map(|id| self.tags.get(id).cloned())
            .collect();
        tags.sort_by_key(|tag| tag.id);

        let ingredients = recipe
            .ingredients
            .iter()
            .filter_map(|item| {
                self.ingredients
                    .get(&item.ingredient_id)
                    .map(|ingredient| RecipeIngredientRow {
                        id: ingredient.id,
                        name: ingredient.name.clone(),
                        measurement_unit: ingredient.measurement_unit.clone(),
                        amount: item.amount,
                    })
            })
            .collect();

        RecipeRecord {
            recipe: recipe.row.clone(),
            tags,
            ingredients,
        }
    }

    /// Foreign key and uniqueness checks shared by create and update.
    fn check_links(
        &self,
        ingredients: &[IngredientAmount],
        tag_ids: &[i64],
    ) -> Result<(), SqlStorageError> {
        let mut seen = HashSet::new();
        for item in ingredients {
            if !self.ingredients.contains_key(&item.ingredient_id) {
                return Err(SqlStorageError::Db(format!(
                    "ingredient {} does not exist",
                    item.ingredient_id
                )));
            }
            if !seen.insert(item.ingredient_id) {
                return Err(SqlStorageError::Conflict("recipe_ingredient".to_owned()));
            }
        }

        let mut seen = HashSet::new();
        for id in tag_ids {
            if !self.tags.contains_key(id) {
                return Err(SqlStorageError::Db(format!("tag {id} does not exist")));
            }
            if !seen.insert(*id) {
                return Err(SqlStorageError::Conflict("recipe_tags_pkey".to_owned()));
            }
        }
        Ok(())
    }

    fn name_taken(&self, author_id: i64, name: &str, exclude_id: Option<i64>) -> bool {
        self.recipes.values().any(|recipe| {
            recipe.row.author_id == author_id
                && recipe.row.name == name
                && Some(recipe.row.id) != exclude_id
        })
    }
}

impl MockSqlStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A storage whose health check fails.
    pub fn disconnected() -> Self {
        Self {
            disconnected: true,
            ..Self::default()
        }
    }

    /// Seeds tags as `(name, color, slug)` triples, assigning ids from 1.
    pub fn with_tags<I, S1, S2, S3>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = (S1, S2, S3)>,
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        {
            let mut state = self.state.write().expect("lock poisoned");
            for (name, color, slug) in tags {
                let id = next_id(&mut state.next_tag_id);
                state.tags.insert(
                    id,
                    TagRow {
                        id,
                        name: name.into(),
                        color: color.into(),
                        slug: slug.into(),
                    },
                );
            }
        }
        self
    }

    /// Seeds ingredients as `(name, measurement_unit)` pairs, assigning ids from 1.
    pub fn with_ingredients<I, S1, S2>(self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = (S1, S2)>,
        S1: Into<String>,
        S2: Into<String>,
    {
        {
            let mut state = self.state.write().expect("lock poisoned");
            for (name, unit) in ingredients {
                let id = next_id(&mut state.next_ingredient_id);
                state.ingredients.insert(
                    id,
                    IngredientRow {
                        id,
                        name: name.into(),
                        measurement_unit: unit.into(),
                    },
                );
            }
        }
        self
    }

    pub fn recipe_count(&self) -> usize {
        self.state.read().expect("lock poisoned").recipes.len()
    }

    /// Number of favorite or cart rows across all users.
    pub fn relation_count(&self, relation: RecipeRelation) -> usize {
        self.state
            .read()
            .expect("lock poisoned")
            .relations
            .iter()
            .filter(|(kind, _, _)| *kind == relation)
            .count()
    }
}

impl SqlStorage for MockSqlStorage {
    async fn is_connected(&self) -> bool {
        !self.disconnected
    }

    async fn tags_list(&self) -> Result<Vec<TagRow>, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.tags.values().cloned().collect())
    }

    async fn tags_get(&self, id: i64) -> Result<Option<TagRow>, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.tags.get(&id).cloned())
    }

    async fn tags_get_many(&self, ids: &[i64]) -> Result<Vec<TagRow>, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .tags
            .values()
            .filter(|tag| ids.contains(&tag.id))
            .cloned()
            .collect())
    }

    async fn tags_create(&self, input: TagCreate) -> Result<TagRow, SqlStorageError> {
        let mut state = self.state.write().expect("lock poisoned");
        if state.tags.values().any(|tag| tag.slug == input.slug) {
            return Err(SqlStorageError::Conflict("tags_slug_key".to_owned()));
        }
        let id = next_id(&mut state.next_tag_id);
        let row = TagRow {
            id,
            name: input.name,
            color: input.color,
            slug: input.slug,
        };
        state.tags.insert(id, row.clone());
        Ok(row)
    }

    async fn ingredients_list(
        &self,
        name_prefix: Option<&str>,
    ) -> Result<Vec<IngredientRow>, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        let prefix = name_prefix.map(str::to_lowercase);
        let mut rows: Vec<IngredientRow> = state
            .ingredients
            .values()
            .filter(|ingredient| match &prefix {
                Some(prefix) => ingredient.name.to_lowercase().starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn ingredients_get(&self, id: i64) -> Result<Option<IngredientRow>, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.ingredients.get(&id).cloned())
    }

    async fn ingredients_get_many(
        &self,
        ids: &[i64],
    ) -> Result<Vec<IngredientRow>, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .ingredients
            .values()
            .filter(|ingredient| ids.contains(&ingredient.id))
            .cloned()
            .collect())
    }

    async fn ingredients_insert_many(
        &self,
        input: Vec<IngredientCreate>,
    ) -> Result<u64, SqlStorageError> {
        let mut state = self.state.write().expect("lock poisoned");
        let mut inserted = 0;
        for item in input {
            let exists = state.ingredients.values().any(|ingredient| {
                ingredient.name == item.name && ingredient.measurement_unit == item.measurement_unit
            });
            if exists {
                continue;
            }
            let id = next_id(&mut state.next_ingredient_id);
            state.ingredients.insert(
                id,
                IngredientRow {
                    id,
                    name: item.name,
                    measurement_unit: item.measurement_unit,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn recipes_list(
        &self,
        params: RecipesListParams,
    ) -> Result<Page<RecipeRecord>, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");

        let mut matching: Vec<&MockRecipe> = state
            .recipes
            .values()
            .filter(|recipe| {
                params
                    .author_id
                    .is_none_or(|author_id| recipe.row.author_id == author_id)
            })
            .filter(|recipe| {
                params.tag_slugs.is_empty()
                    || recipe.tag_ids.iter().any(|id| {
                        state
                            .tags
                            .get(id)
                            .is_some_and(|tag| params.tag_slugs.contains(&tag.slug))
                    })
            })
            .filter(|recipe| {
                params.favorited_by.is_none_or(|user_id| {
                    state
                        .relations
                        .contains(&(RecipeRelation::Favorite, user_id, recipe.row.id))
                })
            })
            .filter(|recipe| {
                params.in_cart_of.is_none_or(|user_id| {
                    state
                        .relations
                        .contains(&(RecipeRelation::Cart, user_id, recipe.row.id))
                })
            })
            .collect();

        matching.sort_by(|a, b| {
            b.row
                .created_at
                .cmp(&a.row.created_at)
                .then(b.row.id.cmp(&a.row.id))
        });

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .map(|recipe| state.record(recipe))
            .collect();

        Ok(Page { items, total })
    }

    async fn recipes_get(&self, id: i64) -> Result<Option<RecipeRecord>, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.recipes.get(&id).map(|recipe| state.record(recipe)))
    }

    async fn recipes_name_taken(
        &self,
        author_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.name_taken(author_id, name, exclude_id))
    }

    async fn recipes_create(&self, input: RecipeCreate) -> Result<RecipeRecord, SqlStorageError> {
        let mut state = self.state.write().expect("lock poisoned");
        if state.name_taken(input.author_id, &input.name, None) {
            return Err(SqlStorageError::Conflict("recipe_author_name".to_owned()));
        }
        state.check_links(&input.ingredients, &input.tag_ids)?;

        let id = next_id(&mut state.next_recipe_id);
        let recipe = MockRecipe {
            row: RecipeRow {
                id,
                author_id: input.author_id,
                name: input.name,
                text: input.text,
                cooking_time: input.cooking_time,
                image: input.image,
                created_at: Utc::now(),
            },
            tag_ids: input.tag_ids,
            ingredients: input.ingredients,
        };
        let record = state.record(&recipe);
        state.recipes.insert(id, recipe);
        Ok(record)
    }

    async fn recipes_update(
        &self,
        id: i64,
        changes: RecipeUpdate,
    ) -> Result<Option<RecipeRecord>, SqlStorageError> {
        let mut state = self.state.write().expect("lock poisoned");
        let Some(author_id) = state.recipes.get(&id).map(|recipe| recipe.row.author_id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name
            && state.name_taken(author_id, name, Some(id))
        {
            return Err(SqlStorageError::Conflict("recipe_author_name".to_owned()));
        }
        state.check_links(&changes.ingredients, &changes.tag_ids)?;

        let Some(recipe) = state.recipes.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            recipe.row.name = name;
        }
        if let Some(text) = changes.text {
            recipe.row.text = text;
        }
        if let Some(cooking_time) = changes.cooking_time {
            recipe.row.cooking_time = cooking_time;
        }
        if let Some(image) = changes.image {
            recipe.row.image = image;
        }
        recipe.tag_ids = changes.tag_ids;
        recipe.ingredients = changes.ingredients;

        Ok(state.recipes.get(&id).map(|recipe| state.record(recipe)))
    }

    async fn recipes_delete(&self, id: i64) -> Result<Option<RecipeRow>, SqlStorageError> {
        let mut state = self.state.write().expect("lock poisoned");
        let removed = state.recipes.remove(&id).map(|recipe| recipe.row);
        if removed.is_some() {
            state
                .relations
                .retain(|(_, _, recipe_id)| *recipe_id != id);
        }
        Ok(removed)
    }

    async fn relation_add(
        &self,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<(), SqlStorageError> {
        let mut state = self.state.write().expect("lock poisoned");
        if !state.recipes.contains_key(&recipe_id) {
            return Err(SqlStorageError::Db(format!(
                "recipe {recipe_id} does not exist"
            )));
        }
        if !state.relations.insert((relation, user_id, recipe_id)) {
            return Err(SqlStorageError::Conflict(relation.table().to_owned()));
        }
        Ok(())
    }

    async fn relation_remove(
        &self,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<bool, SqlStorageError> {
        let mut state = self.state.write().expect("lock poisoned");
        Ok(state.relations.remove(&(relation, user_id, recipe_id)))
    }

    async fn relation_contains(
        &self,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<bool, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.relations.contains(&(relation, user_id, recipe_id)))
    }

    async fn shopping_list(&self, user_id: i64) -> Result<Vec<ShoppingListItem>, SqlStorageError> {
        let state = self.state.read().expect("lock poisoned");
        let lines = state
            .relations
            .iter()
            .filter(|(kind, owner, _)| *kind == RecipeRelation::Cart && *owner == user_id)
            .filter_map(|(_, _, recipe_id)| state.recipes.get(recipe_id))
            .flat_map(|recipe| state.record(recipe).ingredients)
            .map(|row| (row.name, row.measurement_unit, i64::from(row.amount)));
        Ok(shopping_list::aggregate(lines))
    }
}
