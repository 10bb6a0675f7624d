//! LLM relevance filter contract.
//!
//! A [`RelevanceJudge`] is the external model: given candidate concepts and
//! the query, it returns the subset that satisfies one question. The
//! [`RelevanceFilter`] asks two independent questions, one per
//! [`FilterPass`], and checks that every answer refers to a real candidate.
//!
//! The two passes are independent classifications rather than one
//! three-way partition, so a concept may in principle appear in both.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::{ConceptRef, SearchResult};

/// Which relevance question a judge call answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPass {
    /// "Is this concept a genuine match for the query?"
    Matched,
    /// "Is this concept topically related but not a match?"
    Related,
}

impl fmt::Display for FilterPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Matched => "matched",
            Self::Related => "related",
        })
    }
}

/// The external model behind the relevance filter.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    /// Return the candidates that satisfy `pass` for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Filter`] if the model call fails or its output
    /// cannot be parsed.
    async fn judge(
        &self,
        pass: FilterPass,
        candidates: &[ConceptRef],
        query: &str,
    ) -> Result<Vec<ConceptRef>, SearchError>;
}

/// Output of [`RelevanceFilter::filter`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteredResults {
    pub matched: Vec<ConceptRef>,
    pub related: Vec<ConceptRef>,
}

impl FilteredResults {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.related.is_empty()
    }
}

/// Partitions search results into matched and related concepts.
#[derive(Clone)]
pub struct RelevanceFilter {
    judge: Arc<dyn RelevanceJudge>,
    timeout: Duration,
    max_attempts: u32,
}

impl RelevanceFilter {
    pub fn new(judge: Arc<dyn RelevanceJudge>, config: &SearchConfig) -> Self {
        Self {
            judge,
            timeout: config.call_timeout(),
            max_attempts: config.filter_max_attempts.max(1),
        }
    }

    /// Classify `candidates` against `query`.
    ///
    /// Candidates are de-duplicated by `(system, code)` (first occurrence
    /// wins) before the judge sees them. An empty candidate list returns
    /// empty results without calling the judge.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Filter`] if either pass fails after all
    /// attempts or names a concept that was not a candidate, and
    /// [`SearchError::Timeout`] if a pass exceeds the call timeout.
    pub async fn filter(
        &self,
        candidates: &[SearchResult],
        query: &str,
    ) -> Result<FilteredResults, SearchError> {
        let refs = dedup_candidates(candidates);
        if refs.is_empty() {
            tracing::debug!("no candidates, skipping relevance filter");
            return Ok(FilteredResults::default());
        }

        let (matched, related) = tokio::try_join!(
            self.run_pass(FilterPass::Matched, &refs, query),
            self.run_pass(FilterPass::Related, &refs, query),
        )?;

        tracing::debug!(
            candidates = refs.len(),
            matched = matched.len(),
            related = related.len(),
            "relevance filter complete"
        );
        Ok(FilteredResults { matched, related })
    }

    async fn run_pass(
        &self,
        pass: FilterPass,
        candidates: &[ConceptRef],
        query: &str,
    ) -> Result<Vec<ConceptRef>, SearchError> {
        let mut attempt = 1;
        loop {
            match self.attempt_pass(pass, candidates, query).await {
                Ok(refs) => return Ok(refs),
                Err(err) if attempt < self.max_attempts && err.is_transient() => {
                    tracing::warn!(%pass, attempt, error = %err, "relevance pass failed, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt_pass(
        &self,
        pass: FilterPass,
        candidates: &[ConceptRef],
        query: &str,
    ) -> Result<Vec<ConceptRef>, SearchError> {
        let answer = tokio::time::timeout(self.timeout, self.judge.judge(pass, candidates, query))
            .await
            .map_err(|_| {
                SearchError::Timeout(format!(
                    "{pass} relevance pass exceeded {}s",
                    self.timeout.as_secs()
                ))
            })??;
        validate_answer(pass, candidates, answer)
    }
}

impl fmt::Debug for RelevanceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelevanceFilter")
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Concept refs for `results`, first occurrence of each `(system, code)`.
fn dedup_candidates(results: &[SearchResult]) -> Vec<ConceptRef> {
    let mut seen = std::collections::HashSet::new();
    results
        .iter()
        .filter(|r| seen.insert(r.key()))
        .map(SearchResult::concept_ref)
        .collect()
}

/// Reject refs that are not candidates, collapse repeats, and restore the
/// candidate's display text when the model dropped or altered it.
fn validate_answer(
    pass: FilterPass,
    candidates: &[ConceptRef],
    answer: Vec<ConceptRef>,
) -> Result<Vec<ConceptRef>, SearchError> {
    let by_key: HashMap<(&str, &str), &ConceptRef> =
        candidates.iter().map(|c| (c.key(), c)).collect();

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(answer.len());
    for r in &answer {
        let Some(candidate) = by_key.get(&r.key()) else {
            return Err(SearchError::Filter(format!(
                "{pass} pass returned unknown concept {}:{}",
                r.system, r.code
            )));
        };
        if seen.insert(candidate.key()) {
            out.push((*candidate).clone());
        }
    }
    Ok(out)
}
