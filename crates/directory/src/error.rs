use std::time::Duration;

use thiserror::Error;

/// Failure while refreshing the org hierarchy from the directory service.
///
/// `Clone` so a single in-flight refresh can hand the same error to every
/// caller that joined it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HierarchyFetchError {
    /// Connection, TLS, or IO failure before a response was read.
    #[error("directory transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("directory request timed out after {0:?}")]
    Timeout(Duration),

    /// The directory answered with a non-success status.
    #[error("directory returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected schema.
    #[error("directory response rejected: {0}")]
    Schema(String),

    /// The refresh task ended without producing a response (panic or
    /// runtime shutdown).
    #[error("directory refresh interrupted: {0}")]
    Interrupted(String),
}

impl HierarchyFetchError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}
