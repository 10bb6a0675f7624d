//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls result caps, normalization, per-call timeouts,
//! fusion weighting, failure isolation, and the embedding cache. It is
//! constructed once at start-up and passed explicitly to the orchestrator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::DEFAULT_COUNT;

/// Weight applied to the vector score when fusing text and vector results.
///
/// Empirical: normalized vector similarities and lexical scores are not on
/// comparable scales, and this value privileges any nonzero vector match.
pub const DEFAULT_VECTOR_SCORE_SCALE: f64 = 20.0;

/// What to do when one ontology fails during an `"all"` fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole call with the first error.
    #[default]
    Propagate,
    /// Log a warning per failed ontology and return the rest. Fails with
    /// [`SearchError::AllOntologiesFailed`] only if nothing succeeded.
    SkipFailed,
}

/// Configuration for ontology search.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result cap per (ontology × method) call when the caller gives none.
    pub default_count: usize,
    /// Whether to rescale each method's scores to `[0, 1]` by default.
    pub normalize: bool,
    /// Timeout in seconds for each embedding, repository, and filter call.
    pub call_timeout_seconds: u64,
    /// Vector weight used by the result fuser.
    pub vector_score_scale: f64,
    /// Partial-failure handling for multi-ontology searches.
    pub failure_policy: FailurePolicy,
    /// Maximum cached query embeddings. Set to 0 to disable caching.
    pub embedding_cache_capacity: u64,
    /// How long a cached query embedding stays valid, in seconds.
    pub embedding_cache_ttl_seconds: u64,
    /// Attempts per relevance-filter pass (1 means no retry).
    pub filter_max_attempts: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_count: DEFAULT_COUNT,
            normalize: true,
            call_timeout_seconds: 10,
            vector_score_scale: DEFAULT_VECTOR_SCORE_SCALE,
            failure_policy: FailurePolicy::Propagate,
            embedding_cache_capacity: 256,
            embedding_cache_ttl_seconds: 600,
            filter_max_attempts: 1,
        }
    }
}

impl SearchConfig {
    /// Per-call timeout as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Configuration`] if any field is out of range.
    ///
    /// Checks:
    /// - `default_count` must be greater than 0
    /// - `call_timeout_seconds` must be greater than 0
    /// - `vector_score_scale` must be finite and greater than 0
    /// - `filter_max_attempts` must be at least 1
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.default_count == 0 {
            return Err(SearchError::Configuration(
                "default_count must be greater than 0".into(),
            ));
        }
        if self.call_timeout_seconds == 0 {
            return Err(SearchError::Configuration(
                "call_timeout_seconds must be greater than 0".into(),
            ));
        }
        if !self.vector_score_scale.is_finite() || self.vector_score_scale <= 0.0 {
            return Err(SearchError::Configuration(
                "vector_score_scale must be a positive finite number".into(),
            ));
        }
        if self.filter_max_attempts == 0 {
            return Err(SearchError::Configuration(
                "filter_max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
