//! SQLite-backed local cache.
//!
//! One `entries` table maps a cache key (`design-games`, `auth-github-token`, ...)
//! to the JSON text last written under it.

mod cache;

pub use cache::*;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Open (creating if needed) the cache database at `db_path` and apply its schema.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!("Cannot create cache directory {}: {}", dir.display(), e);
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Open the cache at `db_path`, refusing single values above `quota_bytes` (0 = unlimited).
pub async fn open_cache(db_path: &Path, quota_bytes: usize) -> Result<LocalCache, sqlx::Error> {
    let pool = init_database(db_path).await?;
    tracing::debug!("Local cache ready at {}", db_path.display());
    Ok(LocalCache::new(pool).with_quota(quota_bytes))
}

async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_cache_creates_nested_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("ideas").join("cache.sqlite");

        let cache = open_cache(&path, 0).await.unwrap();
        cache.write("design-games-order", &vec!["g1"]).await.unwrap();

        assert!(path.exists());
        let order: Option<Vec<String>> = cache.read("design-games-order").await;
        assert_eq!(order, Some(vec!["g1".to_string()]));
    }

    #[tokio::test]
    async fn test_reopen_keeps_entries_and_applies_quota() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");

        open_cache(&path, 0)
            .await
            .unwrap()
            .write_raw("auth-github-token", "\"ghp_saved\"")
            .await
            .unwrap();

        let cache = open_cache(&path, 16).await.unwrap();
        assert_eq!(
            cache.read_raw("auth-github-token").await.as_deref(),
            Some("\"ghp_saved\"")
        );
        assert!(cache.write_raw("design-ideas", &"x".repeat(64)).await.is_err());
    }
}
