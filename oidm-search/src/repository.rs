//! Concept repository capability and the closed per-ontology registry.
//!
//! Each ontology backend implements [`ConceptRepository`] to provide a
//! uniform lexical + vector search interface. [`Repositories`] carries one
//! backend per [`Ontology`] variant, so looking one up is an exhaustive
//! match rather than a string-keyed table.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::{Ontology, SearchResult};

/// A searchable store of concepts for one ontology.
///
/// Scores returned by the two methods are on backend- and method-specific
/// scales and are not comparable with each other or with other
/// repositories until normalized.
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
#[async_trait]
pub trait ConceptRepository: Send + Sync {
    /// Lexical / full-text search over concept text.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Repository`] if the backend call fails.
    async fn text_search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>, SearchError>;

    /// Nearest-neighbour search over concept embeddings.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Repository`] if the backend call fails.
    async fn vector_search(
        &self,
        query_vector: &[f32],
        count: usize,
    ) -> Result<Vec<SearchResult>, SearchError>;
}

/// The backend for every known ontology.
#[derive(Clone)]
pub struct Repositories {
    pub snomedct: Arc<dyn ConceptRepository>,
    pub radlex: Arc<dyn ConceptRepository>,
    pub anatomic_locations: Arc<dyn ConceptRepository>,
}

impl Repositories {
    /// Build the registry by calling `make` once per ontology.
    pub fn from_fn<F>(mut make: F) -> Self
    where
        F: FnMut(Ontology) -> Arc<dyn ConceptRepository>,
    {
        Self {
            snomedct: make(Ontology::Snomedct),
            radlex: make(Ontology::Radlex),
            anatomic_locations: make(Ontology::AnatomicLocations),
        }
    }

    /// The backend for `ontology`.
    pub fn get(&self, ontology: Ontology) -> &Arc<dyn ConceptRepository> {
        match ontology {
            Ontology::Snomedct => &self.snomedct,
            Ontology::Radlex => &self.radlex,
            Ontology::AnatomicLocations => &self.anatomic_locations,
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
