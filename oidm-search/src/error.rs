//! Error types for the oidm-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. No API keys or sensitive data appear in
//! error messages.

/// Errors that can occur while validating, executing, fusing, or filtering
/// an ontology search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The ontology is not in the known registry and is not `"all"`.
    #[error("invalid ontology: {0}")]
    InvalidOntology(String),

    /// The search mode is not one of `text`, `vector`, `all`.
    #[error("invalid search mode: {0}")]
    InvalidMode(String),

    /// The query is empty or shorter than the minimum length after trimming.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The per-call result count is not a positive integer.
    #[error("invalid count: {0}")]
    InvalidCount(String),

    /// A required capability is missing or the configuration is invalid.
    #[error("config error: {0}")]
    Configuration(String),

    /// A result list could not be rescaled (non-finite scores).
    #[error("normalization error: {0}")]
    Normalization(String),

    /// The embedding capability failed to produce a usable vector.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// A backing repository call failed (network, backend, decoding).
    #[error("repository error: {0}")]
    Repository(String),

    /// A dependency call did not complete within the configured timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The relevance-filter call failed or returned malformed output.
    #[error("filter error: {0}")]
    Filter(String),

    /// Every ontology failed under [`FailurePolicy::SkipFailed`](crate::config::FailurePolicy).
    #[error("all ontologies failed: {0}")]
    AllOntologiesFailed(String),
}

impl SearchError {
    /// True when the request itself was invalid; retrying it unchanged will
    /// fail the same way.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidOntology(_)
                | Self::InvalidMode(_)
                | Self::InvalidQuery(_)
                | Self::InvalidCount(_)
        )
    }

    /// True when a dependency (embedder, repository, filter model) or its
    /// configuration failed.
    pub fn is_dependency(&self) -> bool {
        !self.is_validation()
    }

    /// True for failures that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Repository(_) | Self::Embedding(_) | Self::Timeout(_) | Self::Filter(_)
        )
    }
}

/// Convenience type alias for oidm-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
