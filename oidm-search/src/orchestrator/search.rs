//! Core search orchestrator: concurrent multi-ontology fan-out, per-list
//! normalization, positional merge.
//!
//! One query embedding is computed per call and shared read-only by every
//! ontology searched. Within an ontology, `mode = all` issues the lexical
//! and vector calls concurrently. Across ontologies, `"all"` issues every
//! ontology concurrently and waits for all of them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{FailurePolicy, SearchConfig};
use crate::embedding::{Embedder, Embedding};
use crate::error::SearchError;
use crate::filter::{FilteredResults, RelevanceFilter};
use crate::repository::Repositories;
use crate::types::{
    validate_query, FusedRow, Ontology, OntologySelector, SearchMode, SearchRequest, SearchResult,
};

use super::fusion::FusionTable;
use super::normalize::normalize;

/// Executes validated search requests against the ontology repositories.
#[derive(Clone)]
pub struct Orchestrator {
    repositories: Repositories,
    embedder: Option<Arc<dyn Embedder>>,
    config: SearchConfig,
}

impl Orchestrator {
    /// Build an orchestrator with no embedder (text search only).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Configuration`] if `config` is invalid.
    pub fn new(repositories: Repositories, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            repositories,
            embedder: None,
            config,
        })
    }

    /// Attach the embedding capability required by vector searches.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Parse string arguments and run [`Orchestrator::search`].
    ///
    /// Normalization follows [`SearchConfig::normalize`].
    ///
    /// # Errors
    ///
    /// Validation errors from [`SearchRequest::parse`], then anything
    /// [`Orchestrator::search`] returns.
    pub async fn search_str(
        &self,
        ontology: &str,
        mode: &str,
        query: &str,
        count: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let request = SearchRequest::parse(ontology, mode, query)?.with_count(count)?;
        self.search(&request).await
    }

    /// Run a search and return the merged result list.
    ///
    /// A request without an explicit count uses
    /// [`SearchConfig::default_count`]; one without a normalize flag uses
    /// [`SearchConfig::normalize`].
    ///
    /// # Pipeline
    ///
    /// 1. Fail with [`SearchError::Configuration`] if the mode needs vectors
    ///    and no embedder is attached (before any I/O)
    /// 2. Embed the query once if the mode needs vectors
    /// 3. Fan out to every selected ontology concurrently
    /// 4. Per ontology, run the methods (concurrently for `all`) and
    ///    normalize each method's list on its own
    /// 5. Concatenate in registry order; within an ontology, vector results
    ///    precede text results
    ///
    /// No deduplication happens here: a concept found by both methods
    /// appears once per method.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Propagate`] the first embedding, repository,
    /// timeout, or normalization error aborts the call. Under
    /// [`FailurePolicy::SkipFailed`] an `"all"` search drops failed
    /// ontologies and returns [`SearchError::AllOntologiesFailed`] only if
    /// every ontology failed.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, SearchError> {
        let mode = request.mode();
        let embedder = self.require_embedder(mode)?;
        tracing::trace!(query = request.query(), %mode, selector = %request.selector(), "search");

        let query_vector = match embedder {
            Some(embedder) => Some(self.embed(embedder, request.query()).await?),
            None => None,
        };
        let query_vector = query_vector.as_deref().map(Vec::as_slice);
        let count = request.count().unwrap_or(self.config.default_count);
        let normalize_scores = request.normalize().unwrap_or(self.config.normalize);

        let ontologies = request.selector().ontologies();
        let searches = ontologies.iter().map(|&ontology| {
            self.search_ontology(
                ontology,
                mode,
                request.query(),
                query_vector,
                count,
                normalize_scores,
            )
        });

        let per_ontology = match (request.selector(), self.config.failure_policy) {
            (OntologySelector::All, FailurePolicy::SkipFailed) => {
                let outcomes = futures::future::join_all(searches).await;
                collect_surviving(&ontologies, outcomes)?
            }
            _ => futures::future::try_join_all(searches).await?,
        };

        let results: Vec<SearchResult> = per_ontology.into_iter().flatten().collect();
        tracing::debug!(count = results.len(), "search complete");
        Ok(results)
    }

    /// Run a search, then partition its results with `filter`.
    ///
    /// # Errors
    ///
    /// Anything [`Orchestrator::search`] or [`RelevanceFilter::filter`]
    /// returns.
    pub async fn search_and_filter(
        &self,
        request: &SearchRequest,
        filter: &RelevanceFilter,
    ) -> Result<(Vec<SearchResult>, FilteredResults), SearchError> {
        let results = self.search(request).await?;
        let filtered = filter.filter(&results, request.query()).await?;
        Ok((results, filtered))
    }

    /// Text + vector search over `ontologies`, fused into one ranked table.
    ///
    /// This is the interactive display path: repository scores are used raw
    /// (the fusion weighting is tuned for raw lexical scores against cosine
    /// similarities), each ontology's pair of lists is fused into a table
    /// owned by this call, in the order given. Repeated ontologies are
    /// searched once.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidQuery`], [`SearchError::InvalidCount`],
    /// [`SearchError::Configuration`] when no embedder is attached, and any
    /// embedding or repository failure.
    pub async fn search_fused(
        &self,
        ontologies: &[Ontology],
        query: &str,
        count: usize,
    ) -> Result<Vec<FusedRow>, SearchError> {
        let query = validate_query(query)?;
        if count == 0 {
            return Err(SearchError::InvalidCount(
                "count must be greater than 0".into(),
            ));
        }
        let Some(embedder) = self.require_embedder(SearchMode::All)? else {
            return Err(SearchError::Configuration(
                "fused search requires an embedder".into(),
            ));
        };

        let mut selected: Vec<Ontology> = Vec::with_capacity(ontologies.len());
        for o in ontologies {
            if !selected.contains(o) {
                selected.push(*o);
            }
        }
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embed(embedder, &query).await?;
        let pairs = futures::future::try_join_all(
            selected
                .iter()
                .map(|&ontology| self.fetch_both(ontology, &query, &query_vector, count)),
        )
        .await?;

        let mut table = FusionTable::new(self.config.vector_score_scale);
        for (text, vector) in pairs {
            table.absorb(text, vector);
        }
        Ok(table.into_rows())
    }

    fn require_embedder(&self, mode: SearchMode) -> Result<Option<&Arc<dyn Embedder>>, SearchError> {
        if !mode.needs_vector() {
            return Ok(None);
        }
        match &self.embedder {
            Some(embedder) => Ok(Some(embedder)),
            None => Err(SearchError::Configuration(format!(
                "search mode '{mode}' requires an embedder but none is configured"
            ))),
        }
    }

    async fn embed(&self, embedder: &Arc<dyn Embedder>, query: &str) -> Result<Embedding, SearchError> {
        let vector = with_timeout(self.timeout(), "query embedding", embedder.embed(query)).await?;
        if vector.is_empty() {
            return Err(SearchError::Embedding("embedder returned an empty vector".into()));
        }
        if let Some(expected) = embedder.dimensions() {
            if vector.len() != expected {
                return Err(SearchError::Embedding(format!(
                    "expected {expected} dimensions, got {}",
                    vector.len()
                )));
            }
        }
        Ok(vector)
    }

    /// Search one ontology with the methods `mode` selects.
    async fn search_ontology(
        &self,
        ontology: Ontology,
        mode: SearchMode,
        query: &str,
        query_vector: Option<&[f32]>,
        count: usize,
        normalize_scores: bool,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let prepare = |results: Vec<SearchResult>| {
            if normalize_scores {
                normalize(results)
            } else {
                Ok(results)
            }
        };

        let vector_leg = async {
            match (mode.needs_vector(), query_vector) {
                (false, _) => Ok(None),
                (true, Some(vector)) => self.vector_search(ontology, vector, count).await.map(Some),
                (true, None) => Err(SearchError::Configuration(
                    "vector search requested without a query vector".into(),
                )),
            }
        };
        let text_leg = async {
            if mode.needs_text() {
                self.text_search(ontology, query, count).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let (vector_results, text_results) = tokio::try_join!(vector_leg, text_leg)?;

        let mut results = Vec::new();
        for list in [vector_results, text_results].into_iter().flatten() {
            results.extend(prepare(list)?);
        }

        tracing::debug!(%ontology, %mode, count = results.len(), "ontology search complete");
        Ok(results)
    }

    /// Raw text and vector results for one ontology, fetched concurrently.
    async fn fetch_both(
        &self,
        ontology: Ontology,
        query: &str,
        query_vector: &[f32],
        count: usize,
    ) -> Result<(Vec<SearchResult>, Vec<SearchResult>), SearchError> {
        tokio::try_join!(
            self.text_search(ontology, query, count),
            self.vector_search(ontology, query_vector, count),
        )
    }

    async fn text_search(
        &self,
        ontology: Ontology,
        query: &str,
        count: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let repo = self.repositories.get(ontology);
        with_timeout(
            self.timeout(),
            &format!("{ontology} text search"),
            repo.text_search(query, count),
        )
        .await
    }

    async fn vector_search(
        &self,
        ontology: Ontology,
        query_vector: &[f32],
        count: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let repo = self.repositories.get(ontology);
        with_timeout(
            self.timeout(),
            &format!("{ontology} vector search"),
            repo.vector_search(query_vector, count),
        )
        .await
    }

    fn timeout(&self) -> Duration {
        self.config.call_timeout()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("has_embedder", &self.embedder.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Await `fut`, mapping expiry of `limit` to [`SearchError::Timeout`].
async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, SearchError>
where
    F: Future<Output = Result<T, SearchError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout(format!(
            "{what} exceeded {}s",
            limit.as_secs()
        ))),
    }
}

/// Keep successful ontologies (in registry order), logging the rest.
fn collect_surviving(
    ontologies: &[Ontology],
    outcomes: Vec<Result<Vec<SearchResult>, SearchError>>,
) -> Result<Vec<Vec<SearchResult>>, SearchError> {
    let mut kept = Vec::with_capacity(outcomes.len());
    let mut errors: Vec<String> = Vec::new();

    for (ontology, outcome) in ontologies.iter().zip(outcomes) {
        match outcome {
            Ok(results) => kept.push(results),
            Err(err) => {
                tracing::warn!(%ontology, error = %err, "ontology search failed, skipping");
                errors.push(format!("{ontology}: {err}"));
            }
        }
    }

    if kept.is_empty() && !errors.is_empty() {
        return Err(SearchError::AllOntologiesFailed(errors.join("; ")));
    }
    Ok(kept)
}
