//! User storage trait and implementations.
//!
//! Covers the account records, the subscription graph between users and the
//! table of revoked session tokens.
//!
//! - `UserStorage` trait: interface consumed by the handlers and extractors
//! - `PgUserStorage`: PostgreSQL implementation
//! - `MockUserStorage`: In-memory implementation for testing

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::database::Page;

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredUser {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

/// Error type for user storage operations.
#[derive(Debug, thiserror::Error)]
pub enum UserStorageError {
    /// The email or username is taken. Carries the offending field.
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    /// The user was not found.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The subscription already exists.
    #[error("Already subscribed")]
    AlreadySubscribed,

    /// A database or storage error occurred.
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<sqlx::Error> for UserStorageError {
    fn from(err: sqlx::Error) -> Self {
        UserStorageError::StorageError(err.to_string())
    }
}

/// Trait for user storage operations.
pub trait UserStorage: Clone + Send + Sync + 'static {
    /// Creates a user. Fails with [`UserStorageError::UserAlreadyExists`]
    /// when the email or username is taken.
    fn create_user(
        &self,
        input: NewUser,
    ) -> impl Future<Output = Result<StoredUser, UserStorageError>> + Send;

    fn get_user(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<StoredUser>, UserStorageError>> + Send;

    fn get_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<StoredUser>, UserStorageError>> + Send;

    fn get_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<StoredUser>, UserStorageError>> + Send;

    /// Users ordered by username.
    fn list_users(
        &self,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Result<Page<StoredUser>, UserStorageError>> + Send;

    fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
    ) -> impl Future<Output = Result<(), UserStorageError>> + Send;

    /// Fails with [`UserStorageError::AlreadySubscribed`] when the pair exists.
    fn subscribe(
        &self,
        subscriber_id: i64,
        author_id: i64,
    ) -> impl Future<Output = Result<(), UserStorageError>> + Send;

    /// Returns whether a subscription was removed.
    fn unsubscribe(
        &self,
        subscriber_id: i64,
        author_id: i64,
    ) -> impl Future<Output = Result<bool, UserStorageError>> + Send;

    fn is_subscribed(
        &self,
        subscriber_id: i64,
        author_id: i64,
    ) -> impl Future<Output = Result<bool, UserStorageError>> + Send;

    /// Authors followed by `subscriber_id`, ordered by username.
    fn list_subscriptions(
        &self,
        subscriber_id: i64,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Result<Page<StoredUser>, UserStorageError>> + Send;

    /// Records a revoked token hash until `expires_at`.
    fn revoke_token(
        &self,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), UserStorageError>> + Send;

    fn is_token_revoked(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = Result<bool, UserStorageError>> + Send;
}

/// In-memory mock implementation of `UserStorage` for testing.
#[derive(Clone, Default)]
pub struct MockUserStorage {
    inner: Arc<RwLock<MockUsers>>,
}

#[derive(Default)]
struct MockUsers {
    users: HashMap<i64, StoredUser>,
    next_id: i64,
    /// `(subscriber_id, author_id)` pairs.
    subscriptions: BTreeSet<(i64, i64)>,
    revoked: HashMap<String, DateTime<Utc>>,
}

impl MockUsers {
    fn sorted_by_username<'a>(users: impl Iterator<Item = &'a StoredUser>) -> Vec<StoredUser> {
        let mut users: Vec<StoredUser> = users.cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username).then(a.id.cmp(&b.id)));
        users
    }
}

fn window<T>(items: Vec<T>, limit: i64, offset: i64) -> Page<T> {
    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect();
    Page { items, total }
}

impl MockUserStorage {
    /// Creates a new empty `MockUserStorage`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user as-is (builder pattern). Later generated ids continue
    /// after the highest id seen.
    pub fn with_user(self, user: StoredUser) -> Self {
        {
            let mut inner = self.inner.write().expect("lock poisoned");
            inner.next_id = inner.next_id.max(user.id);
            inner.users.insert(user.id, user);
        }
        self
    }

    /// Returns the number of users in the storage.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").users.len()
    }

    /// Returns `true` if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").subscriptions.len()
    }
}

impl UserStorage for MockUserStorage {
    async fn create_user(&self, input: NewUser) -> Result<StoredUser, UserStorageError> {
        let mut inner = self.inner.write().expect("lock poisoned");

        if inner.users.values().any(|user| user.email == input.email) {
            return Err(UserStorageError::UserAlreadyExists("email".to_owned()));
        }
        if inner.users.values().any(|user| user.username == input.username) {
            return Err(UserStorageError::UserAlreadyExists("username".to_owned()));
        }

        inner.next_id += 1;
        let user = StoredUser {
            id: inner.next_id,
            email: input.email,
            username: input.username,
            first_name: input.first_name,
            last_name: input.last_name,
            password_hash: input.password_hash,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<StoredUser>, UserStorageError> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, UserStorageError> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.users.values().find(|user| user.email == email).cloned())
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<StoredUser>, UserStorageError> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Page<StoredUser>, UserStorageError> {
        let inner = self.inner.read().expect("lock poisoned");
        let users = MockUsers::sorted_by_username(inner.users.values());
        Ok(window(users, limit, offset))
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), UserStorageError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| UserStorageError::UserNotFound(id.to_string()))?;
        user.password_hash = password_hash.to_owned();
        Ok(())
    }

    async fn subscribe(&self, subscriber_id: i64, author_id: i64) -> Result<(), UserStorageError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        if subscriber_id == author_id {
            return Err(UserStorageError::StorageError(
                "no_self_subscription check violated".to_owned(),
            ));
        }
        if !inner.users.contains_key(&author_id) {
            return Err(UserStorageError::UserNotFound(author_id.to_string()));
        }
        if !inner.subscriptions.insert((subscriber_id, author_id)) {
            return Err(UserStorageError::AlreadySubscribed);
        }
        Ok(())
    }

    async fn unsubscribe(&self, subscriber_id: i64, author_id: i64) -> Result<bool, UserStorageError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        Ok(inner.subscriptions.remove(&(subscriber_id, author_id)))
    }

    async fn is_subscribed(&self, subscriber_id: i64, author_id: i64) -> Result<bool, UserStorageError> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.subscriptions.contains(&(subscriber_id, author_id)))
    }

    async fn list_subscriptions(
        &self,
        subscriber_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Page<StoredUser>, UserStorageError> {
        let inner = self.inner.read().expect("lock poisoned");
        let authors = inner
            .subscriptions
            .iter()
            .filter(|(subscriber, _)| *subscriber == subscriber_id)
            .filter_map(|(_, author)| inner.users.get(author));
        let authors = MockUsers::sorted_by_username(authors);
        Ok(window(authors, limit, offset))
    }

    async fn revoke_token(
        &self,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), UserStorageError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.revoked.insert(token_hash.to_owned(), expires_at);
        Ok(())
    }

    async fn is_token_revoked(&self, token_hash: &str) -> Result<bool, UserStorageError> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .revoked
            .get(token_hash)
            .is_some_and(|expires_at| *expires_at > Utc::now()))
    }
}

/// PostgreSQL implementation of `UserStorage`.
#[derive(Clone)]
pub struct PgUserStorage {
    pool: PgPool,
}

impl PgUserStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, password_hash, created_at";

impl UserStorage for PgUserStorage {
    async fn create_user(&self, input: NewUser) -> Result<StoredUser, UserStorageError> {
        let result = sqlx::query_as::<_, StoredUser>(&format!(
            r#"
            INSERT INTO users (email, username, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&input.email)
        .bind(&input.username)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let field = match db_err.constraint() {
                    Some(constraint) if constraint.contains("username") => "username",
                    _ => "email",
                };
                Err(UserStorageError::UserAlreadyExists(field.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: i64) -> Result<Option<StoredUser>, UserStorageError> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, UserStorageError> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<StoredUser>, UserStorageError> {
        let user = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Page<StoredUser>, UserStorageError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username, id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page { items, total })
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), UserStorageError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(UserStorageError::UserNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn subscribe(&self, subscriber_id: i64, author_id: i64) -> Result<(), UserStorageError> {
        let result = sqlx::query("INSERT INTO subscriptions (subscriber_id, author_id) VALUES ($1, $2)")
            .bind(subscriber_id)
            .bind(author_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(UserStorageError::AlreadySubscribed)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                Err(UserStorageError::UserNotFound(author_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn unsubscribe(&self, subscriber_id: i64, author_id: i64) -> Result<bool, UserStorageError> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND author_id = $2")
                .bind(subscriber_id)
                .bind(author_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_subscribed(&self, subscriber_id: i64, author_id: i64) -> Result<bool, UserStorageError> {
        let exists = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE subscriber_id = $1 AND author_id = $2)",
        )
        .bind(subscriber_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_subscriptions(
        &self,
        subscriber_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Page<StoredUser>, UserStorageError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = $1")
                .bind(subscriber_id)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as(
            r#"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.password_hash, u.created_at
            FROM subscriptions s
            JOIN users u ON u.id = s.author_id
            WHERE s.subscriber_id = $1
            ORDER BY u.username, u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(subscriber_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page { items, total })
    }

    async fn revoke_token(
        &self,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), UserStorageError> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (token_hash, expires_at) VALUES ($1, $2)
            ON CONFLICT (token_hash) DO NOTHING
            "#,
        )
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_token_revoked(&self, token_hash: &str) -> Result<bool, UserStorageError> {
        let revoked = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token_hash = $1 AND expires_at > now())",
        )
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_owned(),
            username: username.to_owned(),
            first_name: "First".to_owned(),
            last_name: "Last".to_owned(),
            password_hash: "hash".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates() {
        let storage = MockUserStorage::new();
        storage
            .create_user(new_user("a@example.com", "alice"))
            .await
            .unwrap();

        let err = storage
            .create_user(new_user("a@example.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserStorageError::UserAlreadyExists(field) if field == "email"));

        let err = storage
            .create_user(new_user("b@example.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserStorageError::UserAlreadyExists(field) if field == "username"));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_twice_fails() {
        let storage = MockUserStorage::new();
        let alice = storage
            .create_user(new_user("a@example.com", "alice"))
            .await
            .unwrap();
        let bob = storage
            .create_user(new_user("b@example.com", "bob"))
            .await
            .unwrap();

        storage.subscribe(alice.id, bob.id).await.unwrap();
        assert!(matches!(
            storage.subscribe(alice.id, bob.id).await,
            Err(UserStorageError::AlreadySubscribed)
        ));
        assert!(storage.is_subscribed(alice.id, bob.id).await.unwrap());
        assert!(!storage.is_subscribed(bob.id, alice.id).await.unwrap());

        assert!(storage.unsubscribe(alice.id, bob.id).await.unwrap());
        assert!(!storage.unsubscribe(alice.id, bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_users_is_ordered_and_windowed() {
        let storage = MockUserStorage::new();
        for name in ["carol", "alice", "bob"] {
            storage
                .create_user(new_user(&format!("{name}@example.com"), name))
                .await
                .unwrap();
        }

        let page = storage.list_users(2, 0).await.unwrap();
        assert_eq!(page.total, 3);
        let names: Vec<_> = page.items.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["alice", "bob"]);

        let page = storage.list_users(2, 2).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].username, "carol");
    }

    #[tokio::test]
    async fn test_revoked_token_expires() {
        let storage = MockUserStorage::new();
        storage
            .revoke_token("live", Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        storage
            .revoke_token("stale", Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();

        assert!(storage.is_token_revoked("live").await.unwrap());
        assert!(!storage.is_token_revoked("stale").await.unwrap());
        assert!(!storage.is_token_revoked("unknown").await.unwrap());
    }
}
