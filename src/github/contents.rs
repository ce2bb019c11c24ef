//! Per-file contents API: raw reads and create-or-update writes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use super::{ensure_success, GitHubClient};
use crate::errors::{StoreError, StoreResult};

/// File metadata returned by the contents API.
#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub sha: String,
}

/// Commit metadata returned by the contents API.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
}

/// Result of a successful file write.
#[derive(Debug, Clone, Deserialize)]
pub struct FileCommit {
    pub content: FileInfo,
    pub commit: CommitInfo,
}

#[derive(Serialize)]
struct WriteFileRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

impl GitHubClient {
    /// Read and parse the JSON file at `path`.
    ///
    /// A missing file is a silent `None`. Any other failure is logged and also
    /// surfaces as `None`, so callers can fall back to the local cache.
    pub async fn read_file(&self, path: &str) -> Option<serde_json::Value> {
        match self.try_read_file(path).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Reading {} from the remote store failed: {}", path, e);
                None
            }
        }
    }

    /// Like [`read_file`](Self::read_file), but reports failures other than "not found".
    pub async fn try_read_file(&self, path: &str) -> StoreResult<Option<serde_json::Value>> {
        let response = self
            .request(Method::GET, &self.raw_url(path))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("{} does not exist yet", path);
            return Ok(None);
        }

        let context = format!("Read {}", path);
        let text = ensure_success(response, &context).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Current version token of `path`, or `None` if the file does not exist.
    pub async fn file_version(&self, path: &str) -> StoreResult<Option<String>> {
        let url = self.repo_url(&format!("contents/{}", path));
        let response = self
            .request(Method::GET, &url)
            .query(&[("ref", self.branch())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let context = format!("Look up {}", path);
        let text = ensure_success(response, &context).await?.text().await?;
        let info: FileInfo = serde_json::from_str(&text)?;
        Ok(Some(info.sha))
    }

    /// Write `value` as pretty JSON to `path`, retrying on version conflicts.
    pub async fn write_file<T: Serialize + ?Sized>(
        &self,
        path: &str,
        value: &T,
        message: &str,
    ) -> StoreResult<FileCommit> {
        self.credential.require("save files to the repository")?;

        let text = serde_json::to_string_pretty(value)?;
        let text = text.as_str();
        let commit = self
            .retry
            .run(path, move |_| self.write_file_once(path, text, message))
            .await?;

        tracing::info!("Saved {} in commit {}", path, commit.commit.sha);
        Ok(commit)
    }

    /// One write submission: fetch the version token, encode, submit.
    pub async fn write_file_once(
        &self,
        path: &str,
        text: &str,
        message: &str,
    ) -> StoreResult<FileCommit> {
        let sha = self.file_version(path).await?;
        let body = WriteFileRequest {
            message,
            content: BASE64.encode(text.as_bytes()),
            branch: self.branch(),
            sha,
        };

        let url = self.repo_url(&format!("contents/{}", path));
        let response = self
            .request(Method::PUT, &url)
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::VersionConflict {
                path: path.to_string(),
                attempts: 1,
            });
        }

        let context = format!("Write {}", path);
        let text = ensure_success(response, &context).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
