//! Data façade consumed by the UI layer.
//!
//! Reads prefer the remote store and fall back to the local cache. Writes go to the
//! remote store when a credential is held and are always mirrored to the local cache.

mod board;

pub use board::*;

use std::collections::HashSet;

use serde::Serialize;

use crate::auth::Credential;
use crate::db::LocalCache;
use crate::errors::{StoreError, StoreResult};
use crate::github::{BatchFile, GitHubClient};
use crate::models::{
    Collected, Document, DocumentKind, Entity, Game, Idea, IDEAS_ORDER_KEY_PREFIX,
};

/// What happened to the remote side of a save.
#[derive(Debug)]
pub enum SaveOutcome {
    /// Written to the remote store
    Synced { commit_sha: String },
    /// No credential or no remote; saved locally only
    NotSynced,
    /// The remote write failed; the local copy was still written
    SyncFailed(StoreError),
}

/// Result of a save: the remote outcome plus any local mirror failure.
#[derive(Debug)]
pub struct SaveReport {
    pub outcome: SaveOutcome,
    pub local_error: Option<StoreError>,
}

impl SaveReport {
    pub fn is_synced(&self) -> bool {
        matches!(self.outcome, SaveOutcome::Synced { .. })
    }

    /// True when the data is neither on the remote store nor durably cached.
    pub fn is_lost(&self) -> bool {
        !self.is_synced() && self.local_error.is_some()
    }

    /// One-line description for the user.
    pub fn summary(&self) -> String {
        let remote = match &self.outcome {
            SaveOutcome::Synced { commit_sha } => format!("synced in commit {}", commit_sha),
            SaveOutcome::NotSynced => "saved locally only (not synced)".to_string(),
            SaveOutcome::SyncFailed(e) => format!("sync failed, saved locally: {}", e),
        };
        match &self.local_error {
            Some(e) => format!("{}; local copy not saved: {}", remote, e),
            None => remote,
        }
    }
}

/// Items of one document plus where a stored copy had to be discarded.
#[derive(Debug)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    /// Remote path or cache key of a copy that exists but does not decode
    pub unreadable: Option<String>,
}

impl<T> Loaded<T> {
    fn found(items: Vec<T>) -> Self {
        Self {
            items,
            unreadable: None,
        }
    }
}

/// Remote-first, local-fallback access to every managed document.
#[derive(Clone)]
pub struct DataStore {
    cache: LocalCache,
    remote: Option<GitHubClient>,
    credential: Credential,
    data_dir: String,
}

impl DataStore {
    pub fn new(
        cache: LocalCache,
        remote: Option<GitHubClient>,
        credential: Credential,
        data_dir: &str,
    ) -> Self {
        Self {
            cache,
            remote,
            credential,
            data_dir: data_dir.trim_matches('/').to_string(),
        }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn remote(&self) -> Option<&GitHubClient> {
        self.remote.as_ref()
    }

    /// Whether saves will be attempted against the remote store.
    pub fn can_sync(&self) -> bool {
        self.remote.is_some() && self.credential.is_present()
    }

    fn syncing_remote(&self) -> Option<&GitHubClient> {
        self.remote.as_ref().filter(|_| self.credential.is_present())
    }

    // ==================== GENERIC DOCUMENTS ====================

    /// Load the items of `entity`, remote first, local cache second, empty last.
    pub async fn load_document<T>(&self, entity: &Entity) -> Vec<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.inspect_document(entity).await.items
    }

    /// Like [`load_document`](Self::load_document), but also reports a stored copy
    /// that exists and could not be decoded.
    pub async fn inspect_document<T>(&self, entity: &Entity) -> Loaded<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let kind = entity.kind();
        let mut unreadable = None;

        if let Some(remote) = &self.remote {
            let path = entity.remote_path(&self.data_dir);
            match remote.try_read_file(&path).await {
                Ok(Some(value)) => match Document::decode(value, kind) {
                    Some(items) => return Loaded::found(items),
                    None => unreadable = Some(path),
                },
                Ok(None) => {}
                Err(StoreError::MalformedResponse(e)) => {
                    tracing::warn!("{} is not valid JSON: {}", path, e);
                    unreadable = Some(path);
                }
                Err(e) => tracing::warn!("Reading {} from the remote store failed: {}", path, e),
            }
        }

        let key = entity.cache_key();
        let local = self.cache.read_raw(&key).await.map(|raw| {
            serde_json::from_str(&raw)
                .ok()
                .and_then(|value| Document::decode(value, kind))
        });

        match local {
            Some(Some(items)) => Loaded { items, unreadable },
            Some(None) => Loaded {
                items: Vec::new(),
                unreadable: unreadable.or(Some(key)),
            },
            None => Loaded {
                items: Vec::new(),
                unreadable,
            },
        }
    }

    /// Save the items of `entity` as a single-file write.
    pub async fn save_document<T: Serialize>(&self, entity: &Entity, items: &[T]) -> SaveReport {
        let document = Document::new(entity.kind(), items.iter().collect::<Vec<_>>());

        let outcome = match self.syncing_remote() {
            Some(remote) => {
                let path = entity.remote_path(&self.data_dir);
                match remote
                    .write_file(&path, &document, &entity.commit_message())
                    .await
                {
                    Ok(commit) => SaveOutcome::Synced {
                        commit_sha: commit.commit.sha,
                    },
                    Err(e) => {
                        tracing::error!("Remote save of {} failed: {}", path, e);
                        SaveOutcome::SyncFailed(e)
                    }
                }
            }
            None => SaveOutcome::NotSynced,
        };

        let local_error = self.mirror(&entity.cache_key(), &document).await.err();
        SaveReport {
            outcome,
            local_error,
        }
    }

    async fn mirror<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.cache.write(key, value).await.map_err(|e| {
            tracing::warn!("Local backup of {} failed: {}", key, e);
            e
        })
    }

    // ==================== COLLECTIONS ====================

    pub async fn load_collection<T: Collected>(&self) -> Vec<T> {
        self.load_document(&T::ENTITY).await
    }

    pub async fn save_collection<T: Collected>(&self, items: &[T]) -> SaveReport {
        self.save_document(&T::ENTITY, items).await
    }

    pub async fn load_games(&self) -> Vec<Game> {
        self.load_collection().await
    }

    pub async fn save_games(&self, games: &[Game]) -> SaveReport {
        self.save_collection(games).await
    }

    pub async fn load_ideas(&self) -> Vec<Idea> {
        self.load_collection().await
    }

    pub async fn save_ideas(&self, ideas: &[Idea]) -> SaveReport {
        self.save_collection(ideas).await
    }

    // ==================== ORDERINGS ====================

    pub async fn load_games_order(&self) -> Vec<String> {
        self.load_document(&Entity::GamesOrder).await
    }

    pub async fn save_games_order(&self, order: &[String]) -> SaveReport {
        self.save_document(&Entity::GamesOrder, order).await
    }

    pub async fn load_ideas_order(&self, game_id: &str) -> Vec<String> {
        self.load_document(&Entity::IdeasOrder(game_id.to_string()))
            .await
    }

    pub async fn save_ideas_order(&self, game_id: &str, order: &[String]) -> SaveReport {
        self.save_document(&Entity::IdeasOrder(game_id.to_string()), order)
            .await
    }

    // ==================== SNAPSHOTS ====================

    /// Save a complete set of documents together.
    ///
    /// With a credential and a remote, the documents become the whole managed
    /// directory in one commit. The local cache is then brought to the same state,
    /// in the order given, with idea orderings not in the set removed.
    pub async fn save_snapshot(
        &self,
        documents: &[(Entity, serde_json::Value)],
        message: &str,
    ) -> SaveReport {
        let outcome = match self.syncing_remote() {
            Some(remote) => match self.publish(remote, documents, message).await {
                Ok(commit_sha) => SaveOutcome::Synced { commit_sha },
                Err(e) => {
                    tracing::error!("Batch save failed: {}", e);
                    SaveOutcome::SyncFailed(e)
                }
            },
            None => SaveOutcome::NotSynced,
        };

        let mut local_error = None;
        for (entity, value) in documents {
            if let Err(e) = self.mirror(&entity.cache_key(), value).await {
                local_error = local_error.or(Some(e));
            }
        }
        if let Err(e) = self.prune_orderings(documents).await {
            local_error = local_error.or(Some(e));
        }

        SaveReport {
            outcome,
            local_error,
        }
    }

    async fn publish(
        &self,
        remote: &GitHubClient,
        documents: &[(Entity, serde_json::Value)],
        message: &str,
    ) -> StoreResult<String> {
        let files = documents
            .iter()
            .map(|(entity, value)| -> StoreResult<BatchFile> {
                Ok(BatchFile::new(
                    entity.remote_path(&self.data_dir),
                    serde_json::to_string_pretty(value)?,
                ))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(remote.save_batch(&files, message).await?.commit_sha)
    }

    /// Drop cached idea orderings whose game is not part of `documents`.
    async fn prune_orderings(&self, documents: &[(Entity, serde_json::Value)]) -> StoreResult<()> {
        let kept: HashSet<String> = documents
            .iter()
            .filter(|(entity, _)| entity.kind() == DocumentKind::IdeasOrder)
            .map(|(entity, _)| entity.cache_key())
            .collect();

        for key in self.cache.keys_with_prefix(IDEAS_ORDER_KEY_PREFIX).await? {
            if !kept.contains(&key) {
                self.cache.remove(&key).await?;
            }
        }
        Ok(())
    }
}
