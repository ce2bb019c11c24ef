//! Error handling module for the ideas store.
//!
//! Every failure of the remote client, the batch orchestrator and the local cache is
//! reported as one of the kinds below. Transport errors never leak past this boundary.

use reqwest::StatusCode;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const VERSION_CONFLICT: &str = "VERSION_CONFLICT";
    pub const BRANCH_MOVED: &str = "BRANCH_MOVED";
    pub const STORAGE_FAILURE: &str = "STORAGE_FAILURE";
    pub const MALFORMED_RESPONSE: &str = "MALFORMED_RESPONSE";
    pub const NETWORK_FAILURE: &str = "NETWORK_FAILURE";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
}

/// Store error type.
#[derive(Debug)]
pub enum StoreError {
    /// Remote file or ref absent
    NotFound(String),
    /// Missing or rejected credential
    Unauthorized(String),
    /// Single-file write collided with another writer
    VersionConflict { path: String, attempts: u32 },
    /// Batch commit's final ref update was rejected
    BranchMoved { branch: String, expected_tip: String },
    /// Local cache quota or serialization failure
    Storage(String),
    /// Remote answered with something we cannot use
    MalformedResponse(String),
    /// Transport failure or remote outage
    Network(String),
    /// Rejected domain edit
    Validation(String),
}

impl StoreError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => codes::NOT_FOUND,
            StoreError::Unauthorized(_) => codes::UNAUTHORIZED,
            StoreError::VersionConflict { .. } => codes::VERSION_CONFLICT,
            StoreError::BranchMoved { .. } => codes::BRANCH_MOVED,
            StoreError::Storage(_) => codes::STORAGE_FAILURE,
            StoreError::MalformedResponse(_) => codes::MALFORMED_RESPONSE,
            StoreError::Network(_) => codes::NETWORK_FAILURE,
            StoreError::Validation(_) => codes::VALIDATION_ERROR,
        }
    }

    /// Get the user-facing error message.
    pub fn message(&self) -> String {
        match self {
            StoreError::NotFound(msg) => msg.clone(),
            StoreError::Unauthorized(msg) => msg.clone(),
            StoreError::VersionConflict { path, attempts } if *attempts > 1 => format!(
                "{} was modified concurrently ({} attempts); reload and retry",
                path, attempts
            ),
            StoreError::VersionConflict { path, .. } => {
                format!("{} changed since it was last read", path)
            }
            StoreError::BranchMoved {
                branch,
                expected_tip,
            } => format!(
                "Branch {} moved away from {} during the save; reload and retry",
                branch, expected_tip
            ),
            StoreError::Storage(msg) => msg.clone(),
            StoreError::MalformedResponse(msg) => msg.clone(),
            StoreError::Network(msg) => msg.clone(),
            StoreError::Validation(msg) => msg.clone(),
        }
    }

    /// Whether a single write attempt may be repeated after this error.
    ///
    /// Only a fresh version conflict qualifies; an exhausted one has already been retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::VersionConflict { attempts, .. } if *attempts <= 1)
    }

    /// Classify an unexpected HTTP status from the remote store.
    pub fn from_status(status: StatusCode, context: &str, body: &str) -> Self {
        let detail = remote_message(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        let message = format!("{} failed ({}): {}", context, status.as_u16(), detail);
        match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(message),
            s if s.is_server_error() => StoreError::Network(message),
            _ => StoreError::MalformedResponse(message),
        }
    }
}

/// Pull the `message` field out of a remote error body, if there is one.
fn remote_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Local cache error: {:?}", err);
        StoreError::Storage(format!("Local cache error: {}", err))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            tracing::error!("Undecodable remote response: {:?}", err);
            StoreError::MalformedResponse(format!("Undecodable remote response: {}", err))
        } else {
            tracing::error!("Remote transport error: {:?}", err);
            StoreError::Network(format!("Remote transport error: {}", err))
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        StoreError::MalformedResponse(format!("JSON error: {}", err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            StoreError::from_status(StatusCode::NOT_FOUND, "read", ""),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            StoreError::from_status(StatusCode::FORBIDDEN, "write", ""),
            StoreError::Unauthorized(_)
        ));
        assert!(matches!(
            StoreError::from_status(StatusCode::BAD_GATEWAY, "write", ""),
            StoreError::Network(_)
        ));
        assert!(matches!(
            StoreError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "write", ""),
            StoreError::MalformedResponse(_)
        ));
    }

    #[test]
    fn test_remote_message_is_surfaced() {
        let err = StoreError::from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Write data/ideas.json",
            r#"{"message":"Invalid request.\n\n\"sha\" wasn't supplied."}"#,
        );
        assert!(err.message().contains("wasn't supplied"));
        assert!(err.message().contains("422"));
    }

    #[test]
    fn test_exhausted_conflict_message() {
        let err = StoreError::VersionConflict {
            path: "data/ideas.json".to_string(),
            attempts: 3,
        };
        assert_eq!(err.code(), codes::VERSION_CONFLICT);
        assert!(err.message().contains("reload and retry"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_only_fresh_conflicts_retry() {
        let fresh = StoreError::VersionConflict {
            path: "data/games.json".to_string(),
            attempts: 1,
        };
        assert!(fresh.is_retryable());
        assert!(!StoreError::Unauthorized("no token".to_string()).is_retryable());
        assert!(!StoreError::Network("reset".to_string()).is_retryable());
    }
}
