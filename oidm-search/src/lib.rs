//! # oidm-search
//!
//! Hybrid lexical and vector concept search over medical ontologies.
//!
//! Every ontology (SNOMED CT, RadLex, Anatomic Locations) lives behind a
//! [`ConceptRepository`] that can answer a full-text query and a
//! nearest-neighbour query. The [`Orchestrator`] fans a request out to the
//! selected ontologies concurrently, normalizes each result list on its
//! own, and concatenates them. A separate fused path merges text and
//! vector hits per concept and ranks them by a combined score, and an
//! optional [`RelevanceFilter`] asks a language model which candidates
//! actually match the query.
//!
//! ## Design
//!
//! - Capabilities (repositories, embedder, relevance judge) are injected
//!   as trait objects; nothing is read from process-global state
//! - The query is embedded at most once per call
//! - Each repository call is bounded by the configured timeout
//! - Search queries are logged only at trace level

pub mod config;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod repositories;
pub mod repository;
pub mod types;

pub use config::{FailurePolicy, SearchConfig};
pub use embedding::{CachedEmbedder, Embedder, Embedding};
pub use error::{Result, SearchError};
pub use filter::{FilterPass, FilteredResults, RelevanceFilter, RelevanceJudge};
pub use orchestrator::{fuse, normalize, FusionTable, Orchestrator};
pub use repositories::{AtlasConfig, AtlasRepository};
pub use repository::{ConceptRepository, Repositories};
pub use types::{
    ConceptRef, FusedRow, Ontology, OntologySelector, SearchMode, SearchRequest, SearchResult,
};

/// Search one ontology, or `"all"`, with string arguments.
///
/// Convenience wrapper around [`Orchestrator::search_str`].
///
/// # Errors
///
/// Returns [`SearchError::InvalidMode`], [`SearchError::InvalidOntology`],
/// [`SearchError::InvalidQuery`] or [`SearchError::InvalidCount`] for bad
/// arguments, checked in that order before any I/O. Dependency failures
/// follow the orchestrator's [`FailurePolicy`].
///
/// # Examples
///
/// ```no_run
/// # async fn example(orchestrator: oidm_search::Orchestrator) -> oidm_search::Result<()> {
/// let results = oidm_search::search(&orchestrator, "all", "all", "pulmonary nodule", 10).await?;
/// for result in &results {
///     println!("{} {}: {} ({:.3})", result.system, result.code, result.display, result.score);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search(
    orchestrator: &Orchestrator,
    ontology: &str,
    mode: &str,
    query: &str,
    count: usize,
) -> Result<Vec<SearchResult>> {
    orchestrator.search_str(ontology, mode, query, count).await
}

/// Fused text + vector search across every known ontology.
///
/// # Errors
///
/// Same as [`Orchestrator::search_fused`].
///
/// # Examples
///
/// ```no_run
/// # async fn example(orchestrator: oidm_search::Orchestrator) -> oidm_search::Result<()> {
/// let rows = oidm_search::search_fused_all(&orchestrator, "lung nodule", 5).await?;
/// for row in rows.iter().take(3) {
///     println!("{} {} {:.2}", row.system, row.code, row.combined_score);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search_fused_all(
    orchestrator: &Orchestrator,
    query: &str,
    count: usize,
) -> Result<Vec<FusedRow>> {
    orchestrator
        .search_fused(Ontology::all(), query, count)
        .await
}
