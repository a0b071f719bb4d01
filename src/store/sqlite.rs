use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;

use super::{IdentityStore, Subscription, UserProfile};

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER NOT NULL PRIMARY KEY,
        handle TEXT NOT NULL UNIQUE,
        picture BLOB NOT NULL DEFAULT x''
    )",
    "CREATE TABLE IF NOT EXISTS groups (
        id INTEGER NOT NULL PRIMARY KEY,
        secret TEXT NOT NULL
    )",
];

/// SQLite-backed identity store. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let db_pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(db_pool).await?;
        info!(url, "identity store ready");
        Ok(store)
    }

    /// Single-connection in-memory database, gone once the store is dropped.
    pub async fn in_memory() -> Result<Self> {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(db_pool).await
    }

    pub async fn from_pool(db_pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&db_pool).await?;
        }
        Ok(Self { db_pool })
    }

    pub async fn close(&self) {
        self.db_pool.close().await;
    }
}

fn new_handle() -> String {
    Uuid::new_v4().simple().to_string()
}

type ProfileRow = (i64, String, Vec<u8>);

fn to_profile((user_id, handle, picture): ProfileRow) -> UserProfile {
    UserProfile {
        user_id,
        handle,
        picture,
    }
}

#[async_trait::async_trait]
impl IdentityStore for SqliteStore {
    async fn upsert_profile(&self, user_id: i64, picture: Vec<u8>) -> Result<UserProfile> {
        // The handle only applies on insert; an existing row keeps its own.
        let (handle,): (String,) = sqlx::query_as(
            "INSERT INTO users (id,handle,picture) VALUES (?,?,?)
             ON CONFLICT(id) DO UPDATE SET picture=excluded.picture
             RETURNING handle",
        )
        .bind(user_id)
        .bind(new_handle())
        .bind(picture.as_slice())
        .fetch_one(&self.db_pool)
        .await?;

        debug!(user_id, bytes = picture.len(), "stored profile picture");
        Ok(UserProfile {
            user_id,
            handle,
            picture,
        })
    }

    async fn profile_by_id(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let row: Option<ProfileRow> =
            sqlx::query_as("SELECT id,handle,picture FROM users WHERE id=?")
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?;
        Ok(row.map(to_profile))
    }

    async fn profile_by_handle(&self, handle: &str) -> Result<Option<UserProfile>> {
        let row: Option<ProfileRow> =
            sqlx::query_as("SELECT id,handle,picture FROM users WHERE handle=?")
                .bind(handle)
                .fetch_optional(&self.db_pool)
                .await?;
        Ok(row.map(to_profile))
    }

    async fn delete_profile(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id=?")
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    async fn upsert_subscription(&self, group_id: i64, secret: &str) -> Result<Subscription> {
        sqlx::query("INSERT OR REPLACE INTO groups (id,secret) VALUES (?,?)")
            .bind(group_id)
            .bind(secret)
            .execute(&self.db_pool)
            .await?;
        Ok(Subscription {
            group_id,
            secret: secret.to_owned(),
        })
    }

    async fn secret(&self, group_id: i64) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT secret FROM groups WHERE id=?")
            .bind(group_id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.map(|(secret,)| secret))
    }

    async fn delete_subscription(&self, group_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM groups WHERE id=?")
            .bind(group_id)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }
}
