//! Write credential for the remote store.
//!
//! Possession of a token is the only access-control signal; no scopes are modeled.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};

use crate::db::LocalCache;
use crate::errors::{StoreError, StoreResult};

/// Local cache key holding the persisted token.
pub const TOKEN_KEY: &str = "auth-github-token";

/// An optional bearer token, shared by the remote client and the data façade.
#[derive(Clone, Default)]
pub struct Credential {
    token: Option<Arc<str>>,
}

impl Credential {
    pub fn new(token: Option<String>) -> Self {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Arc::from);
        Self { token }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Load the persisted token; `override_token` wins when set.
    pub async fn load(cache: &LocalCache, override_token: Option<String>) -> Self {
        match override_token {
            Some(token) => Self::new(Some(token)),
            None => Self::new(cache.read::<String>(TOKEN_KEY).await),
        }
    }

    /// Persist `token` for later sessions.
    pub async fn store(cache: &LocalCache, token: &str) -> StoreResult<Self> {
        let credential = Self::new(Some(token.to_string()));
        match &credential.token {
            Some(t) => cache.write(TOKEN_KEY, &**t).await?,
            None => return Err(StoreError::Validation("Token must not be empty".to_string())),
        }
        Ok(credential)
    }

    /// Forget the persisted token.
    pub async fn clear(cache: &LocalCache) -> StoreResult<()> {
        cache.remove(TOKEN_KEY).await
    }

    pub fn is_present(&self) -> bool {
        self.token.is_some()
    }

    /// `Authorization` header value, if a token is held.
    pub fn header(&self) -> Option<(reqwest::header::HeaderName, HeaderValue)> {
        let token = self.token.as_ref()?;
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).ok()?;
        value.set_sensitive(true);
        Some((AUTHORIZATION, value))
    }

    /// Fail with [`StoreError::Unauthorized`] unless a token is held.
    pub fn require(&self, action: &str) -> StoreResult<()> {
        if self.is_present() {
            Ok(())
        } else {
            Err(StoreError::Unauthorized(format!(
                "A GitHub token is required to {}",
                action
            )))
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.is_present() { "<redacted>" } else { "<none>" };
        f.debug_struct("Credential").field("token", &shown).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_is_absent() {
        assert!(!Credential::new(Some("   ".to_string())).is_present());
        assert!(!Credential::new(None).is_present());
        assert!(Credential::new(Some("ghp_abc".to_string())).is_present());
    }

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new(Some("ghp_secret".to_string()));
        let shown = format!("{:?}", credential);
        assert!(!shown.contains("ghp_secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_header_is_bearer() {
        let (name, value) = Credential::new(Some("ghp_abc".to_string()))
            .header()
            .unwrap();
        assert_eq!(name, AUTHORIZATION);
        assert_eq!(value.to_str().unwrap(), "Bearer ghp_abc");
        assert!(Credential::none().header().is_none());
    }

    #[test]
    fn test_require_without_token() {
        let err = Credential::none().require("save ideas").unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }
}
