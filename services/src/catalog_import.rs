//! Parsing and loading of the ingredient and tag catalogs.
//!
//! Ingredients come as CSV lines `name,unit` or as a JSON array of
//! `{name, measurement_unit}`. Tags come as a JSON array of
//! `{name, color, slug}`.

use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use crate::database::{IngredientCreate, SqlStorage, SqlStorageError, TagCreate};

/// Used when a tag entry has no color.
pub const DEFAULT_TAG_COLOR: &str = "#CCCCCC";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    CsvRead(#[from] csv::Error),

    #[error("Record {record}: expected `name,unit`")]
    Csv { record: usize },

    #[error("Tag {slug}: color {color:?} is not #RRGGBB")]
    TagColor { slug: String, color: String },

    #[error(transparent)]
    Storage(#[from] SqlStorageError),
}

#[derive(Debug, Deserialize)]
struct IngredientEntry {
    name: String,
    measurement_unit: String,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    color: Option<String>,
    slug: String,
}

/// Parses headerless `name,unit` records. Quoted fields may contain commas
/// and doubled quotes. Blank lines are skipped; extra columns are ignored.
pub fn parse_ingredients_csv(input: &str) -> Result<Vec<IngredientCreate>, CatalogError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input.as_bytes());

    let mut items = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let (Some(name), Some(unit)) = (record.get(0), record.get(1)) else {
            return Err(CatalogError::Csv { record: index + 1 });
        };
        if name.is_empty() || unit.is_empty() {
            return Err(CatalogError::Csv { record: index + 1 });
        }
        items.push(IngredientCreate {
            name: name.to_owned(),
            measurement_unit: unit.to_owned(),
        });
    }
    Ok(items)
}

pub fn parse_ingredients_json(input: &str) -> Result<Vec<IngredientCreate>, CatalogError> {
    let entries: Vec<IngredientEntry> = serde_json::from_str(input)?;
    Ok(entries
        .into_iter()
        .map(|entry| IngredientCreate {
            name: entry.name.trim().to_owned(),
            measurement_unit: entry.measurement_unit.trim().to_owned(),
        })
        .collect())
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Tag colors must be `#RRGGBB`; a missing or blank color gets [`DEFAULT_TAG_COLOR`].
pub fn parse_tags_json(input: &str) -> Result<Vec<TagCreate>, CatalogError> {
    let entries: Vec<TagEntry> = serde_json::from_str(input)?;
    entries
        .into_iter()
        .map(|entry| {
            let slug = entry.slug.trim().to_owned();
            let color = match entry.color.map(|color| color.trim().to_owned()) {
                Some(color) if color.is_empty() => DEFAULT_TAG_COLOR.to_owned(),
                Some(color) if is_hex_color(&color) => color,
                Some(color) => return Err(CatalogError::TagColor { slug, color }),
                None => DEFAULT_TAG_COLOR.to_owned(),
            };
            Ok(TagCreate {
                name: entry.name.trim().to_owned(),
                color,
                slug,
            })
        })
        .collect()
}

fn read(path: &Path) -> Result<String, CatalogError> {
    std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Loads an ingredient file, picking the format by extension.
/// Returns how many new rows were inserted; existing pairs are left alone.
pub async fn import_ingredients<S: SqlStorage>(
    storage: &S,
    path: &Path,
) -> Result<u64, CatalogError> {
    let input = read(path)?;
    let items = if is_json(path) {
        parse_ingredients_json(&input)?
    } else {
        parse_ingredients_csv(&input)?
    };
    tracing::info!(parsed = items.len(), "Parsed ingredient catalog");
    Ok(storage.ingredients_insert_many(items).await?)
}

/// Loads a tag file. Tags that collide with an existing one are skipped.
pub async fn import_tags<S: SqlStorage>(storage: &S, path: &Path) -> Result<u64, CatalogError> {
    let tags = parse_tags_json(&read(path)?)?;
    let mut inserted = 0;
    for tag in tags {
        let slug = tag.slug.clone();
        match storage.tags_create(tag).await {
            Ok(_) => inserted += 1,
            Err(SqlStorageError::Conflict(constraint)) => {
                tracing::warn!(%slug, %constraint, "Skipping existing tag");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockSqlStorage;

    #[test]
    fn test_csv_skips_blank_lines() {
        let items = parse_ingredients_csv("salt,g\n\n\"bread, white\",slice\n").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].name, "bread, white");
        assert_eq!(items[1].measurement_unit, "slice");
    }

    #[test]
    fn test_csv_quoted_unit_keeps_its_comma() {
        let items = parse_ingredients_csv("\"salt\",\"pinch, small\"\n").unwrap();
        assert_eq!(items[0].name, "salt");
        assert_eq!(items[0].measurement_unit, "pinch, small");
    }

    #[test]
    fn test_csv_doubled_quotes_are_unescaped() {
        let items = parse_ingredients_csv("\"5\"\" pizza base\",pcs\n").unwrap();
        assert_eq!(items[0].name, "5\" pizza base");
        assert_eq!(items[0].measurement_unit, "pcs");
    }

    #[test]
    fn test_csv_reports_short_record() {
        let err = parse_ingredients_csv("salt,g\nsugar\n").unwrap_err();
        assert!(matches!(err, CatalogError::Csv { record: 2 }));
    }

    #[test]
    fn test_json_ingredients() {
        let items =
            parse_ingredients_json(r#"[{"name": " flour ", "measurement_unit": "g"}]"#).unwrap();
        assert_eq!(items[0].name, "flour");
    }

    #[test]
    fn test_tags_get_default_color() {
        let tags = parse_tags_json(
            r#"[{"name": "Lunch", "slug": "lunch"}, {"name": "Tea", "color": " ", "slug": "tea"}]"#,
        )
        .unwrap();
        assert_eq!(tags[0].color, "#CCCCCC");
        assert_eq!(tags[1].color, "#CCCCCC");
    }

    #[test]
    fn test_tag_colors_must_be_hex() {
        let tags = parse_tags_json(r##"[{"name": "Lunch", "color": "#e26c2D", "slug": "lunch"}]"##)
            .unwrap();
        assert_eq!(tags[0].color, "#e26c2D");

        for color in ["red", "#E26C2DFF", "#GGGGGG"] {
            let input = format!(r#"[{{"name": "Lunch", "color": "{color}", "slug": "lunch"}}]"#);
            let err = parse_tags_json(&input).unwrap_err();
            assert!(
                matches!(&err, CatalogError::TagColor { slug, .. } if slug == "lunch"),
                "{color} was accepted"
            );
        }
    }

    #[tokio::test]
    async fn test_import_skips_existing_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.json");
        std::fs::write(
            &path,
            r##"[{"name": "Breakfast", "color": "#E26C2D", "slug": "breakfast"},
                 {"name": "Lunch", "slug": "lunch"}]"##,
        )
        .unwrap();

        let storage = MockSqlStorage::new().with_tags([("Breakfast", "#E26C2D", "breakfast")]);
        assert_eq!(import_tags(&storage, &path).await.unwrap(), 1);
        assert_eq!(storage.tags_list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_ingredients_csv_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingredients.csv");
        std::fs::write(&path, "salt,g\nsugar,g\n").unwrap();

        let storage = MockSqlStorage::new();
        assert_eq!(import_ingredients(&storage, &path).await.unwrap(), 2);
        assert_eq!(import_ingredients(&storage, &path).await.unwrap(), 0);
    }
}
