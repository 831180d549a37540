//! Request body of recipe create/update and its storage-independent checks.

use std::collections::HashSet;

use serde::Deserialize;

use super::error::FieldErrors;
use crate::database::{IngredientAmount, MAX_QUANTITY, MIN_QUANTITY};
use crate::media::{DecodedImage, decode_data_url};

pub const MAX_NAME_LEN: usize = 254;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

/// Every field is optional at the serde level so that missing fields are
/// reported alongside the other field errors instead of as a parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeWriteRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientAmountRequest>>,
    #[serde(default)]
    pub tags: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmountRequest {
    pub id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Every field is required.
    Create,
    /// `ingredients` and `tags` are required; the rest keep their value when absent.
    Update,
}

/// A request that passed the shape checks. Scalars are `None` only for
/// fields an update leaves untouched.
#[derive(Debug)]
pub struct ValidatedRecipe {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i16>,
    pub image: Option<DecodedImage>,
    pub ingredients: Vec<IngredientAmount>,
    pub tag_ids: Vec<i64>,
}

fn quantity(value: i64) -> Result<i16, String> {
    if value < i64::from(MIN_QUANTITY) {
        Err(format!(
            "Ensure this value is greater than or equal to {MIN_QUANTITY}."
        ))
    } else if value > i64::from(MAX_QUANTITY) {
        Err(format!(
            "Ensure this value is less than or equal to {MAX_QUANTITY}."
        ))
    } else {
        Ok(value as i16)
    }
}

impl RecipeWriteRequest {
    /// Runs every check that does not need storage, recording problems in
    /// `errors`. The returned value is only meaningful when `errors` stays empty.
    pub fn validate_shape(
        self,
        mode: WriteMode,
        max_image_bytes: usize,
        errors: &mut FieldErrors,
    ) -> ValidatedRecipe {
        let required = mode == WriteMode::Create;

        let name = match self.name.map(|name| name.trim().to_owned()) {
            Some(name) if name.is_empty() => {
                errors.add("name", BLANK);
                None
            }
            Some(name) if name.chars().count() > MAX_NAME_LEN => {
                errors.add(
                    "name",
                    format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
                );
                None
            }
            Some(name) => Some(name),
            None => {
                if required {
                    errors.add("name", REQUIRED);
                }
                None
            }
        };

        let text = match self.text {
            Some(text) if text.trim().is_empty() => {
                errors.add("text", BLANK);
                None
            }
            Some(text) => Some(text),
            None => {
                if required {
                    errors.add("text", REQUIRED);
                }
                None
            }
        };

        let cooking_time = match self.cooking_time.map(quantity) {
            Some(Ok(minutes)) => Some(minutes),
            Some(Err(message)) => {
                errors.add("cooking_time", message);
                None
            }
            None => {
                if required {
                    errors.add("cooking_time", REQUIRED);
                }
                None
            }
        };

        let image = match self.image.as_deref().map(str::trim) {
            Some("") => {
                errors.add("image", BLANK);
                None
            }
            Some(data) => match decode_data_url(data, max_image_bytes) {
                Ok(image) => Some(image),
                Err(e) => {
                    errors.add("image", e.to_string());
                    None
                }
            },
            None => {
                if required {
                    errors.add("image", REQUIRED);
                }
                None
            }
        };

        let ingredients = match self.ingredients {
            None => {
                errors.add("ingredients", REQUIRED);
                Vec::new()
            }
            Some(items) if items.is_empty() => {
                errors.add("ingredients", "Add at least one ingredient.");
                Vec::new()
            }
            Some(items) => validate_ingredients(items, errors),
        };

        let tag_ids = match self.tags {
            None => {
                errors.add("tags", REQUIRED);
                Vec::new()
            }
            Some(ids) if ids.is_empty() => {
                errors.add("tags", "Add at least one tag.");
                Vec::new()
            }
            Some(ids) => {
                let mut seen = HashSet::new();
                if !ids.iter().all(|id| seen.insert(*id)) {
                    errors.add("tags", "Tags must not repeat.");
                }
                ids
            }
        };

        ValidatedRecipe {
            name,
            text,
            cooking_time,
            image,
            ingredients,
            tag_ids,
        }
    }
}

fn validate_ingredients(
    items: Vec<IngredientAmountRequest>,
    errors: &mut FieldErrors,
) -> Vec<IngredientAmount> {
    let mut seen = HashSet::new();
    let mut duplicate = false;
    let mut amounts = Vec::with_capacity(items.len());

    for item in items {
        if !seen.insert(item.id) {
            duplicate = true;
        }
        match quantity(item.amount) {
            Ok(amount) => amounts.push(IngredientAmount {
                ingredient_id: item.id,
                amount,
            }),
            Err(_) => errors.add(
                "ingredients",
                format!(
                    "Amount of ingredient {} must be between {MIN_QUANTITY} and {MAX_QUANTITY}.",
                    item.id
                ),
            ),
        }
    }

    if duplicate {
        errors.add("ingredients", "Ingredients must not repeat.");
    }
    amounts
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn complete() -> RecipeWriteRequest {
        RecipeWriteRequest {
            name: Some("  Pancakes ".to_owned()),
            text: Some("Mix and fry.".to_owned()),
            cooking_time: Some(20),
            image: Some(PNG_DATA_URL.to_owned()),
            ingredients: Some(vec![IngredientAmountRequest { id: 1, amount: 200 }]),
            tags: Some(vec![1, 2]),
        }
    }

    #[test]
    fn complete_create_request_passes() {
        let mut errors = FieldErrors::new();
        let recipe = complete().validate_shape(WriteMode::Create, 1024, &mut errors);

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(recipe.name.as_deref(), Some("Pancakes"));
        assert_eq!(recipe.cooking_time, Some(20));
        assert!(recipe.image.is_some());
        assert_eq!(recipe.tag_ids, vec![1, 2]);
    }

    #[test]
    fn create_reports_every_missing_field() {
        let mut errors = FieldErrors::new();
        RecipeWriteRequest::default().validate_shape(WriteMode::Create, 1024, &mut errors);

        for field in ["name", "text", "cooking_time", "image", "ingredients", "tags"] {
            assert!(errors.has(field), "missing error for {field}");
        }
    }

    #[test]
    fn update_only_requires_ingredients_and_tags() {
        let request = RecipeWriteRequest {
            ingredients: Some(vec![IngredientAmountRequest { id: 3, amount: 1 }]),
            tags: Some(vec![1]),
            ..Default::default()
        };
        let mut errors = FieldErrors::new();
        let recipe = request.validate_shape(WriteMode::Update, 1024, &mut errors);

        assert!(errors.is_empty(), "{errors:?}");
        assert!(recipe.name.is_none());
        assert!(recipe.image.is_none());

        let mut errors = FieldErrors::new();
        RecipeWriteRequest::default().validate_shape(WriteMode::Update, 1024, &mut errors);
        assert!(errors.has("ingredients"));
        assert!(errors.has("tags"));
        assert!(!errors.has("name"));
    }

    #[test]
    fn empty_lists_are_rejected() {
        let request = RecipeWriteRequest {
            ingredients: Some(vec![]),
            tags: Some(vec![]),
            ..complete()
        };
        let mut errors = FieldErrors::new();
        request.validate_shape(WriteMode::Update, 1024, &mut errors);

        assert!(errors.has("ingredients"));
        assert!(errors.has("tags"));
    }

    #[test]
    fn bounds_and_duplicates_are_rejected() {
        let request = RecipeWriteRequest {
            cooking_time: Some(501),
            ingredients: Some(vec![
                IngredientAmountRequest { id: 1, amount: 0 },
                IngredientAmountRequest { id: 1, amount: 10 },
            ]),
            tags: Some(vec![2, 2]),
            ..complete()
        };
        let mut errors = FieldErrors::new();
        request.validate_shape(WriteMode::Create, 1024, &mut errors);

        assert!(errors.has("cooking_time"));
        assert!(errors.has("ingredients"));
        assert!(errors.has("tags"));
        assert!(!errors.has("name"));
    }

    #[test]
    fn blank_and_overlong_names_are_rejected() {
        let mut errors = FieldErrors::new();
        RecipeWriteRequest {
            name: Some("   ".to_owned()),
            ..complete()
        }
        .validate_shape(WriteMode::Create, 1024, &mut errors);
        assert!(errors.has("name"));

        let mut errors = FieldErrors::new();
        RecipeWriteRequest {
            name: Some("x".repeat(MAX_NAME_LEN + 1)),
            ..complete()
        }
        .validate_shape(WriteMode::Create, 1024, &mut errors);
        assert!(errors.has("name"));
    }

    #[test]
    fn bad_image_is_a_field_error() {
        let mut errors = FieldErrors::new();
        RecipeWriteRequest {
            image: Some("https://example.com/cat.png".to_owned()),
            ..complete()
        }
        .validate_shape(WriteMode::Create, 1024, &mut errors);
        assert!(errors.has("image"));
    }
}
