//! Multi-file saves published as exactly one commit.

use std::collections::BTreeMap;

use super::{is_managed_path, GitHubClient, TreeEntry};
use crate::errors::{StoreError, StoreResult};

/// One file of a batch: a managed path and its JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub path: String,
    pub content: String,
}

impl BatchFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// The commit a batch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCommit {
    pub commit_sha: String,
    pub parent_sha: String,
    pub file_count: usize,
}

/// Build the tree entries replacing the managed directory with `new_blobs`.
///
/// Entries outside `data_dir` are kept verbatim (directory entries are implied by
/// their children). Managed files absent from `new_blobs` get a deletion entry,
/// since the new tree is layered over the old one.
pub fn plan_tree(
    existing: &[TreeEntry],
    data_dir: &str,
    new_blobs: &BTreeMap<String, String>,
) -> Vec<TreeEntry> {
    let mut working: BTreeMap<String, TreeEntry> = BTreeMap::new();

    for entry in existing.iter().filter(|e| !e.is_tree()) {
        if !is_managed_path(&entry.path, data_dir) {
            working.insert(entry.path.clone(), entry.clone());
        } else if !new_blobs.contains_key(&entry.path) {
            working.insert(entry.path.clone(), TreeEntry::deletion(&entry.path));
        }
    }

    for (path, sha) in new_blobs {
        working.insert(path.clone(), TreeEntry::blob(path, sha));
    }

    working.into_values().collect()
}

impl GitHubClient {
    /// Publish `files` as the complete contents of the managed directory in one commit.
    ///
    /// Steps: resolve the branch tip, its tree and every entry below it; create one
    /// blob per file; create a tree over the old one; commit it on top of the tip;
    /// fast-forward the branch. If the branch moved meanwhile, nothing is published.
    pub async fn save_batch(&self, files: &[BatchFile], message: &str) -> StoreResult<BatchCommit> {
        self.credential.require("commit to the repository")?;

        if let Some(stray) = files
            .iter()
            .find(|f| !is_managed_path(&f.path, &self.data_dir))
        {
            return Err(StoreError::Validation(format!(
                "{} is outside the managed directory {}",
                stray.path, self.data_dir
            )));
        }

        let branch = self.branch().to_string();
        let tip = self.branch_tip(&branch).await?;
        let base = self.commit(&tip).await?;
        let listing = self.tree_recursive(&base.tree.sha).await?;
        if listing.truncated {
            return Err(StoreError::MalformedResponse(format!(
                "Tree {} is too large to list completely",
                base.tree.sha
            )));
        }

        let mut new_blobs = BTreeMap::new();
        for file in files {
            let sha = self.create_blob(&file.content).await?;
            new_blobs.insert(file.path.clone(), sha);
        }

        let entries = plan_tree(&listing.tree, &self.data_dir, &new_blobs);
        let tree = self.create_tree(&base.tree.sha, &entries).await?;
        let commit_sha = self.create_commit(message, &tree, &[tip.as_str()]).await?;
        self.advance_branch(&branch, &commit_sha, &tip).await?;

        tracing::info!(
            "Committed {} file(s) to {} as {} (parent {})",
            new_blobs.len(),
            branch,
            commit_sha,
            tip
        );

        Ok(BatchCommit {
            commit_sha,
            parent_sha: tip,
            file_count: new_blobs.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, kind: &str, sha: &str) -> TreeEntry {
        TreeEntry {
            path: path.to_string(),
            mode: if kind == "tree" { "040000" } else { "100644" }.to_string(),
            kind: kind.to_string(),
            sha: Some(sha.to_string()),
        }
    }

    #[test]
    fn test_plan_replaces_managed_directory() {
        let existing = vec![
            entry("a.txt", "blob", "a1"),
            entry("data", "tree", "t1"),
            entry("data/x.json", "blob", "x1"),
            entry("data/y.json", "blob", "y1"),
        ];
        let new_blobs = BTreeMap::from([("data/x.json".to_string(), "x2".to_string())]);

        let plan = plan_tree(&existing, "data", &new_blobs);

        assert_eq!(
            plan,
            vec![
                entry("a.txt", "blob", "a1"),
                TreeEntry::blob("data/x.json", "x2"),
                TreeEntry::deletion("data/y.json"),
            ]
        );
    }

    #[test]
    fn test_plan_keeps_lookalike_directories() {
        let existing = vec![
            entry("database/schema.sql", "blob", "s1"),
            entry("vendor/lib", "commit", "c1"),
        ];
        let plan = plan_tree(&existing, "data", &BTreeMap::new());
        assert_eq!(plan, existing);
    }

    #[test]
    fn test_deletion_serializes_null_sha() {
        let value = serde_json::to_value(TreeEntry::deletion("data/y.json")).unwrap();
        assert_eq!(value["sha"], serde_json::Value::Null);
        assert_eq!(value["type"], "blob");
    }
}
