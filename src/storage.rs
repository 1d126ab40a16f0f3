//! Profile storage: the collaborator trait command modules talk to, and the
//! Postgres-backed handle the bot connects while starting.
//!
//! Each "collection" is a table of JSONB documents keyed by user id.

use crate::config::is_identifier;
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::prelude::TypeMapKey;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::instrument;

pub const STARTING_BALANCE: i64 = 100;

/// A user's profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: u64,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            balance: STARTING_BALANCE,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Connects the handle. `ensure_schema` creates the collection table when it is missing.
    async fn init(
        &self,
        url: &str,
        database: &str,
        collection: &str,
        ensure_schema: bool,
    ) -> Result<(), StorageError>;

    /// Releases the connection. Safe to call when not connected.
    async fn close(&self);

    async fn fetch_profile(&self, user_id: u64) -> Result<Option<Profile>, StorageError>;

    async fn save_profile(&self, profile: &Profile) -> Result<(), StorageError>;
}

/// Registry key for the connected storage handle.
pub struct StorageKey;

impl TypeMapKey for StorageKey {
    type Value = Arc<dyn Storage>;
}

/// Retrieves a user's profile, creating the default document on first use.
pub async fn get_or_create_profile(
    store: &dyn Storage,
    user_id: u64,
) -> Result<Profile, StorageError> {
    if let Some(profile) = store.fetch_profile(user_id).await? {
        return Ok(profile);
    }
    let profile = Profile::new(user_id);
    store.save_profile(&profile).await?;
    tracing::debug!(target = "storage.profile", user_id, "created default profile");
    Ok(profile)
}

struct Connected {
    pool: PgPool,
    collection: String,
}

/// Postgres storage handle. Declared up front, connected later by [`Storage::init`].
pub struct PgStore {
    connect_timeout: Duration,
    inner: RwLock<Option<Connected>>,
}

impl PgStore {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            inner: RwLock::new(None),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.read().await.is_some()
    }

    async fn connected(&self) -> Result<(PgPool, String), StorageError> {
        let guard = self.inner.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        Ok((conn.pool.clone(), conn.collection.clone()))
    }
}

#[async_trait]
impl Storage for PgStore {
    #[instrument(level = "debug", skip(self, url))]
    async fn init(
        &self,
        url: &str,
        database: &str,
        collection: &str,
        ensure_schema: bool,
    ) -> Result<(), StorageError> {
        if !is_identifier(collection) {
            return Err(StorageError::InvalidCollection(collection.to_string()));
        }
        let options = PgConnectOptions::from_str(url)?.database(database);
        let connect = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(self.connect_timeout)
            .connect_with(options);
        let pool = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| StorageError::Timeout(self.connect_timeout.as_secs()))??;

        if ensure_schema {
            let ddl = format!(
                r#"CREATE TABLE IF NOT EXISTS "{collection}" (user_id BIGINT PRIMARY KEY, doc JSONB NOT NULL)"#
            );
            sqlx::query(&ddl).execute(&pool).await?;
        }

        let previous = self.inner.write().await.replace(Connected {
            pool,
            collection: collection.to_string(),
        });
        if let Some(old) = previous {
            old.pool.close().await;
        }
        tracing::info!(target = "storage", database, collection, "storage connected");
        Ok(())
    }

    async fn close(&self) {
        if let Some(conn) = self.inner.write().await.take() {
            conn.pool.close().await;
            tracing::info!(target = "storage", "storage closed");
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_profile(&self, user_id: u64) -> Result<Option<Profile>, StorageError> {
        let (pool, collection) = self.connected().await?;
        let sql = format!(r#"SELECT doc FROM "{collection}" WHERE user_id = $1"#);
        let doc = sqlx::query_scalar::<_, Json<Profile>>(&sql)
            .bind(user_id as i64)
            .fetch_optional(&pool)
            .await?;
        Ok(doc.map(|Json(profile)| profile))
    }

    #[instrument(level = "debug", skip(self, profile), fields(user_id = profile.user_id))]
    async fn save_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let (pool, collection) = self.connected().await?;
        let sql = format!(
            r#"INSERT INTO "{collection}" (user_id, doc) VALUES ($1, $2)
               ON CONFLICT (user_id) DO UPDATE SET doc = EXCLUDED.doc"#
        );
        sqlx::query(&sql)
            .bind(profile.user_id as i64)
            .bind(Json(profile.clone()))
            .execute(&pool)
            .await?;
        Ok(())
    }
}
