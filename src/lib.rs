//! Ideas Sync
//!
//! Keeps game design ideas, their games and their display orderings in a GitHub
//! repository, with a SQLite cache as fallback and backup.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod github;
pub mod models;
pub mod store;

use auth::Credential;
use config::{Config, RepoSettings};
use errors::StoreResult;
use github::{Endpoints, GitHubClient, RetryPolicy};
use store::DataStore;

/// Build the session's store: cache, persisted settings, credential and remote client.
///
/// The remote client is left out when running offline or when the persisted
/// repository settings are incomplete; the store then works from the cache alone.
pub async fn open_store(config: &Config) -> StoreResult<DataStore> {
    let cache = db::open_cache(&config.cache_path, config.cache_quota_bytes).await?;

    let settings = RepoSettings::load(&cache).await;
    let credential = Credential::load(&cache, config.token.clone()).await;

    let remote = if config.offline {
        tracing::info!("Offline mode: using the local cache only");
        None
    } else {
        match GitHubClient::new(
            Endpoints::from(config),
            settings,
            credential.clone(),
            &config.data_dir,
        ) {
            Ok(client) => Some(client.with_retry(RetryPolicy::from(config))),
            Err(e) => {
                tracing::warn!("Remote store unavailable: {}", e);
                None
            }
        }
    };

    if remote.is_some() && !credential.is_present() {
        tracing::warn!("No GitHub token configured; changes will be saved locally only");
    }

    Ok(DataStore::new(cache, remote, credential, &config.data_dir))
}
