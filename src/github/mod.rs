//! Remote repository client.
//!
//! Wraps the two API surfaces of the remote store: per-file contents (with optimistic
//! retry on version conflicts) and the git data primitives behind batch commits.

mod batch;
mod contents;
mod git;
mod retry;

pub use batch::*;
pub use contents::*;
pub use git::*;
pub use retry::*;

use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::auth::Credential;
use crate::config::{Config, RepoSettings};
use crate::errors::{StoreError, StoreResult};

const ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("ideas-sync/", env!("CARGO_PKG_VERSION"));

/// Base URLs of the remote store.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_base: String,
    pub raw_base: String,
}

impl From<&Config> for Endpoints {
    fn from(config: &Config) -> Self {
        Self {
            api_base: config.api_base.clone(),
            raw_base: config.raw_base.clone(),
        }
    }
}

/// Client for one repository branch.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    settings: RepoSettings,
    credential: Credential,
    data_dir: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(
        endpoints: Endpoints,
        settings: RepoSettings,
        credential: Credential,
        data_dir: &str,
    ) -> StoreResult<Self> {
        if !settings.is_complete() {
            return Err(StoreError::Validation(
                "Repository owner, name and branch are required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            endpoints,
            settings,
            credential,
            data_dir: data_dir.trim_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn settings(&self) -> &RepoSettings {
        &self.settings
    }

    pub fn branch(&self) -> &str {
        &self.settings.branch
    }

    pub fn data_dir(&self) -> &str {
        &self.data_dir
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// URL of a repository API resource.
    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.endpoints.api_base, self.settings.owner, self.settings.repo, tail
        )
    }

    /// URL of a file's raw content on the configured branch.
    fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.endpoints.raw_base,
            self.settings.owner,
            self.settings.repo,
            self.settings.branch,
            path
        )
    }

    /// Start a request carrying the API headers and, when held, the credential.
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header(header::ACCEPT, ACCEPT);
        if let Some((name, value)) = self.credential.header() {
            builder = builder.header(name, value);
        }
        builder
    }

    /// Send `request` and decode a successful JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> StoreResult<T> {
        let response = ensure_success(request.send().await?, context).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!("{}: undecodable response: {}", context, e);
            StoreError::MalformedResponse(format!("{}: undecodable response: {}", context, e))
        })
    }
}

/// Turn a non-success response into the matching [`StoreError`].
async fn ensure_success(response: Response, context: &str) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::from_status(status, context, &body))
}

/// Whether `path` lies inside the managed data directory.
pub fn is_managed_path(path: &str, data_dir: &str) -> bool {
    path == data_dir
        || path
            .strip_prefix(data_dir)
            .is_some_and(|rest| rest.starts_with('/'))
}
