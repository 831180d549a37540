//! Bounded in-process cache of revoked session tokens.
//!
//! Logout writes the token hash to the `revoked_tokens` table and to this
//! cache. The auth extractor consults the cache first and falls back to the
//! table on a miss, warming the cache when the table says "revoked".
//! Entries may be evicted at any time; the table stays authoritative.

use foyer::{Cache, CacheBuilder};
use std::sync::Arc;

/// Number of token hashes kept in memory.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Clone)]
pub struct RevocationCache {
    inner: Arc<Cache<String, ()>>,
    capacity: usize,
}

impl RevocationCache {
    pub fn new(capacity: usize) -> Self {
        let cache = CacheBuilder::new(capacity).build();
        Self {
            inner: Arc::new(cache),
            capacity,
        }
    }

    /// Mark a token hash as revoked.
    pub fn add_revoked(&self, token_hash: impl Into<String>) {
        self.inner.insert(token_hash.into(), ());
    }

    /// `true` on a cache hit. A miss says nothing; check the table.
    pub fn is_revoked(&self, token_hash: &str) -> bool {
        self.inner.get(token_hash).is_some()
    }
}

impl Default for RevocationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for RevocationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationCache")
            .field("capacity", &self.capacity)
            .finish()
    }
}
