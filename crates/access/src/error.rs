use thiserror::Error;

use orgscope_core::UserId;
use orgscope_directory::HierarchyFetchError;

/// Errors surfaced by the scoping engine to its callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The hierarchy could not be refreshed; the caller should show a
    /// retryable "could not verify access scope" state.
    #[error("could not verify access scope: {0}")]
    Fetch(#[from] HierarchyFetchError),

    /// No extractor is registered for this entity type.
    #[error("unknown entity type '{0}'")]
    UnknownEntityType(String),

    /// A cache bound to one principal was asked to serve another.
    #[error("hierarchy cache belongs to principal {expected}, not {actual}")]
    PrincipalMismatch { expected: UserId, actual: UserId },

    /// The auth context holds no principal.
    #[error("no authenticated principal in session")]
    Unauthenticated,
}

impl ScopeError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScopeError::Fetch(_))
    }
}
