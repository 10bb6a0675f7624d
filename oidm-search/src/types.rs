//! Core types: search hits, ontology identification, search modes, and
//! validated search requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SearchError;

/// Minimum query length (in characters) after trimming.
pub const MIN_QUERY_LENGTH: usize = 3;

/// Default per-(ontology × method) result cap.
pub const DEFAULT_COUNT: usize = 25;

/// A single ranked hit returned from a concept repository.
///
/// Raw scores from different repositories or methods are not comparable
/// until normalized; after [`normalize`](crate::orchestrator::normalize::normalize) they
/// lie in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Source vocabulary, e.g. `RADLEX`, `SNOMEDCT`, `ANATOMICLOCATIONS`.
    pub system: String,
    /// Concept identifier, unique within `system`.
    pub code: String,
    /// Human-readable label. May be empty but must be present.
    pub display: String,
    /// Relevance value (higher is better).
    pub score: f64,
}

impl SearchResult {
    /// Build a result from its parts.
    pub fn new(
        system: impl Into<String>,
        code: impl Into<String>,
        display: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display: display.into(),
            score,
        }
    }

    /// The `(system, code)` pair identifying the underlying concept.
    pub fn key(&self) -> (&str, &str) {
        (&self.system, &self.code)
    }

    /// Drop the score, keeping the concept reference.
    pub fn concept_ref(&self) -> ConceptRef {
        ConceptRef {
            system: self.system.clone(),
            code: self.code.clone(),
            display: self.display.clone(),
        }
    }
}

/// A scoreless reference to a concept, as returned by the relevance filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConceptRef {
    pub system: String,
    pub code: String,
    #[serde(default)]
    pub display: String,
}

impl ConceptRef {
    pub fn key(&self) -> (&str, &str) {
        (&self.system, &self.code)
    }
}

/// One row of the fused text/vector table used by the interactive display
/// path. `text_score` and `vector_score` are 0 when the concept was not
/// returned by that method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRow {
    pub system: String,
    pub code: String,
    pub display: String,
    pub text_score: f64,
    pub vector_score: f64,
    pub combined_score: f64,
}

/// The closed set of ontologies this crate knows how to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ontology {
    /// SNOMED CT clinical terms.
    Snomedct,
    /// RadLex radiology lexicon.
    Radlex,
    /// ACR anatomic locations.
    AnatomicLocations,
}

impl Ontology {
    /// Identifier used on the command line and as the collection name.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Snomedct => "snomedct",
            Self::Radlex => "radlex",
            Self::AnatomicLocations => "anatomic_locations",
        }
    }

    /// The `system` value stamped on results from this ontology.
    pub fn system_name(&self) -> &'static str {
        match self {
            Self::Snomedct => "SNOMEDCT",
            Self::Radlex => "RADLEX",
            Self::AnatomicLocations => "ANATOMICLOCATIONS",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Snomedct => "SNOMED CT",
            Self::Radlex => "RadLex",
            Self::AnatomicLocations => "Anatomic Locations",
        }
    }

    /// All known ontologies, in registry order. Multi-ontology results are
    /// concatenated in this order.
    pub fn all() -> &'static [Ontology] {
        &[Self::Snomedct, Self::Radlex, Self::AnatomicLocations]
    }
}

impl fmt::Display for Ontology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Ontology {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|o| o.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SearchError::InvalidOntology(s.to_string()))
    }
}

/// Which ontologies a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OntologySelector {
    One(Ontology),
    All,
}

impl OntologySelector {
    /// The ontologies to search, in registry order.
    pub fn ontologies(&self) -> Vec<Ontology> {
        match self {
            Self::One(o) => vec![*o],
            Self::All => Ontology::all().to_vec(),
        }
    }
}

impl FromStr for OntologySelector {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::One)
    }
}

impl fmt::Display for OntologySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(o) => o.fmt(f),
            Self::All => f.write_str("all"),
        }
    }
}

/// Which search methods to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Lexical / full-text search only.
    Text,
    /// Embedding nearest-neighbour search only.
    Vector,
    /// Both, issued concurrently per ontology.
    All,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Vector => "vector",
            Self::All => "all",
        }
    }

    /// Whether this mode needs a query embedding.
    pub fn needs_vector(&self) -> bool {
        matches!(self, Self::Vector | Self::All)
    }

    /// Whether this mode runs the lexical method.
    pub fn needs_text(&self) -> bool {
        matches!(self, Self::Text | Self::All)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "vector" => Ok(Self::Vector),
            "all" => Ok(Self::All),
            _ => Err(SearchError::InvalidMode(s.to_string())),
        }
    }
}

/// A validated search request.
///
/// Construct with [`SearchRequest::parse`] (string arguments, validated in
/// the order mode → ontology → query) or [`SearchRequest::new`] (typed).
/// Not deserializable: every instance has passed validation.
///
/// A request without an explicit count or normalize flag takes the
/// orchestrator's [`SearchConfig`](crate::config::SearchConfig) values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    selector: OntologySelector,
    mode: SearchMode,
    query: String,
    count: Option<usize>,
    normalize: Option<bool>,
}

impl SearchRequest {
    /// Build a request from typed parts. The query is trimmed and checked.
    pub fn new(selector: OntologySelector, mode: SearchMode, query: &str) -> Result<Self, SearchError> {
        Ok(Self {
            selector,
            mode,
            query: validate_query(query)?,
            count: None,
            normalize: None,
        })
    }

    /// Parse and validate string arguments.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidMode`], [`SearchError::InvalidOntology`], or
    /// [`SearchError::InvalidQuery`], checked in that order.
    pub fn parse(ontology: &str, mode: &str, query: &str) -> Result<Self, SearchError> {
        let mode: SearchMode = mode.parse()?;
        let selector: OntologySelector = ontology.parse()?;
        Self::new(selector, mode, query)
    }

    /// Set the per-(ontology × method) result cap.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidCount`] when `count` is 0.
    pub fn with_count(mut self, count: usize) -> Result<Self, SearchError> {
        if count == 0 {
            return Err(SearchError::InvalidCount(
                "count must be greater than 0".into(),
            ));
        }
        self.count = Some(count);
        Ok(self)
    }

    /// Set whether per-list scores are rescaled to `[0, 1]`.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn selector(&self) -> OntologySelector {
        self.selector
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// The trimmed query text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The explicit result cap, if one was set.
    pub fn count(&self) -> Option<usize> {
        self.count
    }

    /// The explicit normalize flag, if one was set.
    pub fn normalize(&self) -> Option<bool> {
        self.normalize
    }
}

/// Trim `query` and enforce [`MIN_QUERY_LENGTH`].
pub fn validate_query(query: &str) -> Result<String, SearchError> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_LENGTH {
        return Err(SearchError::InvalidQuery(format!(
            "query must be at least {MIN_QUERY_LENGTH} characters after trimming"
        )));
    }
    Ok(trimmed.to_string())
}
