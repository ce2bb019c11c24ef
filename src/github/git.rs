//! Low-level commit graph primitives: refs, commits, trees and blobs.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ensure_success, GitHubClient};
use crate::errors::{StoreError, StoreResult};

/// Mode of a regular, non-executable file.
pub const FILE_MODE: &str = "100644";

#[derive(Debug, Clone, Deserialize)]
pub struct ShaRef {
    pub sha: String,
}

/// Branch reference; only the commit it points at is used.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    pub object: ShaRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCommit {
    pub tree: ShaRef,
}

/// One entry of a tree listing or tree creation request.
///
/// A `sha` of `None` in a creation request deletes the path from the base tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: Option<String>,
}

impl TreeEntry {
    pub fn blob(path: &str, sha: &str) -> Self {
        Self {
            path: path.to_string(),
            mode: FILE_MODE.to_string(),
            kind: "blob".to_string(),
            sha: Some(sha.to_string()),
        }
    }

    pub fn deletion(path: &str) -> Self {
        Self {
            path: path.to_string(),
            mode: FILE_MODE.to_string(),
            kind: "blob".to_string(),
            sha: None,
        }
    }

    pub fn is_tree(&self) -> bool {
        self.kind == "tree"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitTree {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

impl GitHubClient {
    /// Commit id the branch currently points to.
    pub async fn branch_tip(&self, branch: &str) -> StoreResult<String> {
        let url = self.repo_url(&format!("git/ref/heads/{}", branch));
        let git_ref: GitRef = self
            .send_json(self.request(Method::GET, &url), "Read branch ref")
            .await?;
        Ok(git_ref.object.sha)
    }

    pub async fn commit(&self, sha: &str) -> StoreResult<GitCommit> {
        let url = self.repo_url(&format!("git/commits/{}", sha));
        self.send_json(self.request(Method::GET, &url), "Read commit")
            .await
    }

    /// Every entry reachable from tree `sha`.
    pub async fn tree_recursive(&self, sha: &str) -> StoreResult<GitTree> {
        let url = self.repo_url(&format!("git/trees/{}", sha));
        self.send_json(
            self.request(Method::GET, &url).query(&[("recursive", "1")]),
            "Read tree",
        )
        .await
    }

    /// Store `content` as a blob and return its id.
    pub async fn create_blob(&self, content: &str) -> StoreResult<String> {
        let url = self.repo_url("git/blobs");
        let body = json!({
            "content": BASE64.encode(content.as_bytes()),
            "encoding": "base64",
        });
        let blob: ShaRef = self
            .send_json(self.request(Method::POST, &url).json(&body), "Create blob")
            .await?;
        Ok(blob.sha)
    }

    /// Create a tree from `entries` layered over `base_tree`.
    pub async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> StoreResult<String> {
        let url = self.repo_url("git/trees");
        let body = json!({ "base_tree": base_tree, "tree": entries });
        let tree: ShaRef = self
            .send_json(self.request(Method::POST, &url).json(&body), "Create tree")
            .await?;
        Ok(tree.sha)
    }

    pub async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[&str],
    ) -> StoreResult<String> {
        let url = self.repo_url("git/commits");
        let body = json!({ "message": message, "tree": tree, "parents": parents });
        let commit: ShaRef = self
            .send_json(self.request(Method::POST, &url).json(&body), "Create commit")
            .await?;
        Ok(commit.sha)
    }

    /// Fast-forward `branch` to `sha`.
    ///
    /// The update is never forced; a rejection because the branch moved since
    /// `expected_tip` was read becomes [`StoreError::BranchMoved`].
    pub async fn advance_branch(
        &self,
        branch: &str,
        sha: &str,
        expected_tip: &str,
    ) -> StoreResult<()> {
        let url = self.repo_url(&format!("git/refs/heads/{}", branch));
        let body = json!({ "sha": sha, "force": false });
        let response = self
            .request(Method::PATCH, &url)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
                tracing::error!(
                    "Branch {} moved away from {}; commit {} was not published",
                    branch,
                    expected_tip,
                    sha
                );
                Err(StoreError::BranchMoved {
                    branch: branch.to_string(),
                    expected_tip: expected_tip.to_string(),
                })
            }
            _ => {
                ensure_success(response, "Update branch ref").await?;
                Ok(())
            }
        }
    }
}
