//! Key-value cache of JSON documents.
//!
//! Reads never fail: a missing row, an unreadable row and an undecodable value are all
//! "absent". Writes report quota and serialization problems as [`StoreError::Storage`].

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{Row, SqlitePool};

use crate::errors::{StoreError, StoreResult};

/// Local fallback store for documents and settings.
#[derive(Clone)]
pub struct LocalCache {
    pool: SqlitePool,
    quota_bytes: usize,
}

impl LocalCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            quota_bytes: 0,
        }
    }

    /// Refuse values whose serialized form exceeds `bytes` (0 means unlimited).
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = bytes;
        self
    }

    /// Read and decode the value under `key`.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding malformed cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Read the stored JSON text under `key`.
    pub async fn read_raw(&self, key: &str) -> Option<String> {
        let row = sqlx::query("SELECT value FROM entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(row) => row.map(|r| r.get("value")),
            Err(e) => {
                tracing::warn!("Failed to read cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Serialize `value` and store it under `key`.
    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let text = serde_json::to_string(value)
            .map_err(|e| StoreError::Storage(format!("Cannot serialize {}: {}", key, e)))?;
        self.write_raw(key, &text).await
    }

    /// Store already-serialized JSON text under `key`.
    pub async fn write_raw(&self, key: &str, text: &str) -> StoreResult<()> {
        if self.quota_bytes > 0 && key.len() + text.len() > self.quota_bytes {
            return Err(StoreError::Storage(format!(
                "Local storage quota exceeded writing {} ({} bytes, limit {})",
                key,
                text.len(),
                self.quota_bytes
            )));
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO entries (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(text)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove the value under `key`. Removing an absent key is not an error.
    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List stored keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM entries WHERE substr(key, 1, ?) = ? ORDER BY key")
            .bind(prefix.len() as i64)
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.get("key")).collect())
    }
}
