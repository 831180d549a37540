//! Accounts and sessions.
//!
//! - Password hashing and strength rules
//! - HS256 session tokens and their revocation
//! - The `RequireAuth` / `MaybeAuth` extractors
//! - Account and login routes
//! - Storage abstraction for users and subscriptions

pub mod password;
pub mod revocation_cache;
pub mod routes;
pub mod session_auth;
pub mod storage;
pub mod token;

pub use revocation_cache::RevocationCache;
pub use routes::{LoginResponse, RegisteredUser};
pub use session_auth::{MaybeAuth, RequireAuth, SessionAuthError};
pub use storage::{
    MockUserStorage, NewUser, PgUserStorage, StoredUser, UserStorage, UserStorageError,
};
