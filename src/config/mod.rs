//! Configuration module for the ideas store.
//!
//! Process configuration is loaded from environment variables with sensible defaults.
//! Repository coordinates are user-editable and persisted in the local cache.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::LocalCache;
use crate::errors::StoreResult;

/// Local cache key holding the persisted [`RepoSettings`].
pub const REPO_SETTINGS_KEY: &str = "github-repo-config";

pub const DEFAULT_OWNER: &str = "Kisdews";
pub const DEFAULT_REPO: &str = "kisdews.github.io";
pub const DEFAULT_BRANCH: &str = "master";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite file backing the local cache
    pub cache_path: PathBuf,
    /// Byte budget for a single cached value (0 disables the check)
    pub cache_quota_bytes: usize,
    /// Base URL of the REST API
    pub api_base: String,
    /// Base URL serving raw file contents
    pub raw_base: String,
    /// Managed data directory inside the repository
    pub data_dir: String,
    /// Leave the remote client unconfigured
    pub offline: bool,
    /// Delay unit for conflict retries
    pub retry_base_delay: Duration,
    /// Total write submissions before giving up on a conflict
    pub retry_attempts: u32,
    /// Credential override; takes precedence over the cached token
    pub token: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let cache_path = env::var("IDEAS_CACHE_PATH")
            .unwrap_or_else(|_| "./data/cache.sqlite".to_string())
            .into();

        let cache_quota_bytes = parse_or("IDEAS_CACHE_QUOTA_BYTES", 5 * 1024 * 1024);

        let api_base = env::var("IDEAS_API_BASE")
            .unwrap_or_else(|_| "https://api.github.com".to_string())
            .trim_end_matches('/')
            .to_string();

        let raw_base = env::var("IDEAS_RAW_BASE")
            .unwrap_or_else(|_| "https://raw.githubusercontent.com".to_string())
            .trim_end_matches('/')
            .to_string();

        let data_dir = env::var("IDEAS_DATA_DIR")
            .unwrap_or_else(|_| "data".to_string())
            .trim_matches('/')
            .to_string();

        let offline = env::var("IDEAS_OFFLINE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let retry_base_delay = Duration::from_millis(parse_or("IDEAS_RETRY_BASE_MS", 500));
        let retry_attempts = parse_or("IDEAS_RETRY_ATTEMPTS", 3).max(1);

        let token = env::var("GITHUB_TOKEN").ok().filter(|t| !t.trim().is_empty());

        let log_level = env::var("IDEAS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            cache_path,
            cache_quota_bytes,
            api_base,
            raw_base,
            data_dir,
            offline,
            retry_base_delay,
            retry_attempts,
            token,
            log_level,
        }
    }
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}", var, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Repository coordinates, editable by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSettings {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl Default for RepoSettings {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            repo: DEFAULT_REPO.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
        }
    }
}

/// A partial settings update; empty fields leave the current value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoSettingsPatch {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl RepoSettings {
    /// Load persisted settings, falling back to the defaults.
    pub async fn load(cache: &LocalCache) -> Self {
        cache
            .read::<RepoSettingsPatch>(REPO_SETTINGS_KEY)
            .await
            .map(|patch| Self::default().merge(patch))
            .unwrap_or_default()
    }

    /// Overlay the non-empty fields of `patch`.
    pub fn merge(mut self, patch: RepoSettingsPatch) -> Self {
        fn pick(current: &mut String, candidate: Option<String>) {
            if let Some(value) = candidate.map(|v| v.trim().to_string()) {
                if !value.is_empty() {
                    *current = value;
                }
            }
        }

        pick(&mut self.owner, patch.owner);
        pick(&mut self.repo, patch.repo);
        pick(&mut self.branch, patch.branch);
        self
    }

    /// Merge `patch` into the persisted settings and store the result.
    pub async fn update(cache: &LocalCache, patch: RepoSettingsPatch) -> StoreResult<Self> {
        let merged = Self::load(cache).await.merge(patch);
        cache.write(REPO_SETTINGS_KEY, &merged).await?;
        tracing::info!(
            "Repository set to {}/{}@{}",
            merged.owner,
            merged.repo,
            merged.branch
        );
        Ok(merged)
    }

    /// Whether enough is known to talk to the remote store.
    pub fn is_complete(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty() && !self.branch.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("IDEAS_CACHE_PATH");
        env::remove_var("IDEAS_API_BASE");
        env::remove_var("IDEAS_RAW_BASE");
        env::remove_var("IDEAS_DATA_DIR");
        env::remove_var("IDEAS_OFFLINE");
        env::remove_var("IDEAS_RETRY_BASE_MS");
        env::remove_var("IDEAS_RETRY_ATTEMPTS");
        env::remove_var("IDEAS_LOG_LEVEL");

        let config = Config::from_env();

        assert_eq!(config.cache_path, PathBuf::from("./data/cache.sqlite"));
        assert_eq!(config.api_base, "https://api.github.com");
        assert_eq!(config.raw_base, "https://raw.githubusercontent.com");
        assert_eq!(config.data_dir, "data");
        assert!(!config.offline);
        assert_eq!(config.retry_base_delay, Duration::from_millis(500));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let merged = RepoSettings::default().merge(RepoSettingsPatch {
            owner: Some("someone".to_string()),
            repo: Some("   ".to_string()),
            branch: None,
        });

        assert_eq!(merged.owner, "someone");
        assert_eq!(merged.repo, DEFAULT_REPO);
        assert_eq!(merged.branch, DEFAULT_BRANCH);
    }
}
