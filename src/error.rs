//! Error types for the oidm host.

use oidm_search::SearchError;

/// Top-level error type for configuration loading and wiring.
#[derive(Debug, thiserror::Error)]
pub enum OidmError {
    /// Configuration file or environment error.
    #[error("config error: {0}")]
    Config(String),

    /// Search library error.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// HTTP client construction error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, OidmError>;
