//! Storage contracts for users and refresh entries.
//!
//! The service never touches a concrete map or table; it talks to a
//! [`Backend`], which hands out one [`UserStore`] and one [`RefreshStore`].
//! Two backends exist: [`MemoryBackend`] (process-local) and
//! [`crate::db::Database`] (SQLite).

mod memory;

use std::future::Future;

use thiserror::Error;

pub use memory::{MemoryBackend, MemoryRefreshStore, MemoryUserStore};

/// A user record.
///
/// Passwords are kept in plaintext, as in the demo this service models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    /// Incremented to invalidate every access token issued before
    pub token_version: u64,
}

/// A tracked refresh credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEntry {
    /// Random identifier, also the lookup key
    pub refresh_id: String,
    /// Opaque secret presented alongside the id
    pub secret: String,
    pub user_id: i64,
    /// Issued at (Unix timestamp)
    pub issued_at: u64,
    /// Expiration time (Unix timestamp)
    pub expires_at: u64,
    pub revoked: bool,
    /// Successor created when this entry was rotated
    pub replaced_by: Option<String>,
}

impl RefreshEntry {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at < now
    }

    /// Not revoked and not expired.
    pub fn is_live(&self, now: u64) -> bool {
        !self.revoked && !self.is_expired(now)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Store lock poisoned")]
    Poisoned,
    #[error("Username already taken: {0}")]
    UsernameTaken(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// User lookups and the token-version counter.
pub trait UserStore: Send + Sync {
    /// Create a user with token version 0.
    fn create(&self, username: &str, password: &str)
    -> impl Future<Output = StoreResult<User>> + Send;

    fn get(&self, id: i64) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    fn get_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Increment the user's token version. Returns the new version, or `None`
    /// if no such user exists.
    fn bump_token_version(&self, id: i64) -> impl Future<Output = StoreResult<Option<u64>>> + Send;
}

/// Refresh entry storage.
pub trait RefreshStore: Send + Sync {
    fn insert(&self, entry: &RefreshEntry) -> impl Future<Output = StoreResult<()>> + Send;

    fn get(&self, refresh_id: &str)
    -> impl Future<Output = StoreResult<Option<RefreshEntry>>> + Send;

    /// Mark an entry revoked. Returns `false` if the entry does not exist.
    /// Revoking an already revoked entry is a no-op that returns `true`.
    fn revoke(&self, refresh_id: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Atomically revoke `refresh_id`, point it at `successor`, and store the
    /// successor. Only succeeds while `refresh_id` is still unrevoked;
    /// returns `false` (and stores nothing) otherwise.
    fn rotate(
        &self,
        refresh_id: &str,
        successor: &RefreshEntry,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Live entries of a user, newest first.
    fn list_by_user(
        &self,
        user_id: i64,
        now: u64,
    ) -> impl Future<Output = StoreResult<Vec<RefreshEntry>>> + Send;
}

/// A pair of stores the service runs against.
pub trait Backend: Clone + Send + Sync + 'static {
    type Users: UserStore;
    type Tokens: RefreshStore;

    fn users(&self) -> &Self::Users;
    fn tokens(&self) -> &Self::Tokens;
}
