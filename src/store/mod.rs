mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;

/// A group's current broadcast secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub group_id: i64,
    pub secret: String,
}

/// Cached profile picture of a user who shared a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: i64,
    /// Unguessable public name of the picture, unrelated to `user_id`.
    pub handle: String,
    pub picture: Vec<u8>,
}

/// Durable point lookups and writes for subscriptions and profiles.
///
/// Every call is atomic on its own; nothing spans more than one key.
/// `None` means the record does not exist.
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Creates the profile with a fresh handle, or replaces the picture of an
    /// existing one while keeping its handle.
    async fn upsert_profile(&self, user_id: i64, picture: Vec<u8>) -> Result<UserProfile>;

    async fn profile_by_id(&self, user_id: i64) -> Result<Option<UserProfile>>;

    async fn profile_by_handle(&self, handle: &str) -> Result<Option<UserProfile>>;

    async fn delete_profile(&self, user_id: i64) -> Result<()>;

    /// Sets the single secret of a group, replacing any previous one.
    async fn upsert_subscription(&self, group_id: i64, secret: &str) -> Result<Subscription>;

    async fn secret(&self, group_id: i64) -> Result<Option<String>>;

    async fn delete_subscription(&self, group_id: i64) -> Result<()>;
}
