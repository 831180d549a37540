//! Storage for uploaded recipe images.
//!
//! Files live behind an OpenDAL [`Operator`]: the local filesystem under
//! `MEDIA_ROOT` in deployments, an in-memory backend in tests. Public URLs
//! are `MEDIA_URL` followed by the object key.

mod image;

pub use image::{DecodedImage, ImageDecodeError, content_type_for, decode_data_url};

use opendal::{ErrorKind, Operator};

/// Key prefix for recipe images.
pub const RECIPE_IMAGE_DIR: &str = "recipes/images";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Media backend error: {0}")]
    Backend(#[from] opendal::Error),
}

#[derive(Clone, Debug)]
pub struct MediaStore {
    operator: Operator,
    base_url: String,
}

impl MediaStore {
    /// Filesystem-backed store rooted at `root`.
    pub fn fs(root: &str, base_url: &str) -> Result<Self, MediaError> {
        let builder = opendal::services::Fs::default().root(root);
        let operator = Operator::new(builder)?.finish();
        Ok(Self::with_operator(operator, base_url))
    }

    /// In-memory store, used by tests.
    pub fn memory(base_url: &str) -> Result<Self, MediaError> {
        let operator = Operator::new(opendal::services::Memory::default())?.finish();
        Ok(Self::with_operator(operator, base_url))
    }

    fn with_operator(operator: Operator, base_url: &str) -> Self {
        let mut base_url = base_url.to_owned();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { operator, base_url }
    }

    /// Stores a decoded recipe image under a fresh key and returns the key.
    pub async fn save_recipe_image(&self, image: DecodedImage) -> Result<String, MediaError> {
        let key = format!(
            "{RECIPE_IMAGE_DIR}/{}.{}",
            uuid::Uuid::new_v4(),
            image.extension
        );
        self.operator.write(&key, image.bytes).await?;
        tracing::debug!(%key, "Stored recipe image");
        Ok(key)
    }

    /// `None` when nothing is stored under `key`.
    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediaError> {
        match self.operator.read(key).await {
            Ok(buffer) => Ok(Some(buffer.to_vec())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal; failures are logged, not returned.
    pub async fn remove(&self, key: &str) {
        if key.is_empty() {
            return;
        }
        if let Err(e) = self.operator.delete(key).await {
            tracing::warn!(%key, "Failed to remove media file: {e}");
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> DecodedImage {
        DecodedImage {
            extension: "png",
            bytes: vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0],
        }
    }

    #[tokio::test]
    async fn saved_image_can_be_read_and_removed() {
        let store = MediaStore::memory("/media").unwrap();
        let key = store.save_recipe_image(png()).await.unwrap();

        assert!(key.starts_with("recipes/images/"));
        assert!(key.ends_with(".png"));
        assert_eq!(store.read(&key).await.unwrap(), Some(png().bytes));

        store.remove(&key).await;
        assert_eq!(store.read(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn url_joins_base_and_key() {
        let store = MediaStore::memory("/media").unwrap();
        assert_eq!(
            store.url_for("recipes/images/a.png"),
            "/media/recipes/images/a.png"
        );
    }

    #[tokio::test]
    async fn fs_store_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let store = MediaStore::fs(root, "/media/").unwrap();

        let key = store.save_recipe_image(png()).await.unwrap();
        assert!(dir.path().join(&key).exists());
    }
}
