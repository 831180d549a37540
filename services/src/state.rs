use crate::database::SqlStorage;
use crate::media::MediaStore;
use crate::users::{RevocationCache, UserStorage};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState<S, U> {
    pub sql_storage: S,
    pub user_storage: U,
    pub media: MediaStore,
    pub revocation_cache: RevocationCache,
}

impl<S, U> AppState<S, U>
where
    S: SqlStorage,
    U: UserStorage,
{
    pub fn new(sql_storage: S, user_storage: U, media: MediaStore) -> Self {
        Self {
            sql_storage,
            user_storage,
            media,
            revocation_cache: RevocationCache::default(),
        }
    }
}
