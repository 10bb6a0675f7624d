//! Atlas aggregation pipelines for lexical and vector concept search.
//!
//! Both pipelines end in a `$project` stage that emits documents shaped
//! exactly like [`SearchResult`](crate::types::SearchResult):
//! `{system, code, display, score}`.

use mongodb::bson::{doc, Document};

use crate::types::Ontology;

/// Atlas Search index used for lexical queries.
pub const TEXT_SEARCH_INDEX: &str = "defaultText";
/// Atlas Vector Search index used for embedding queries.
pub const VECTOR_SEARCH_INDEX: &str = "defaultVector";
/// Document field holding the concept embedding.
pub const EMBEDDING_FIELD: &str = "embedding_vector";
/// `numCandidates = count * COUNT_TO_CANDIDATES_RATIO` for vector search.
pub const COUNT_TO_CANDIDATES_RATIO: usize = 15;

/// Where an ontology's concepts live and which fields hold code and label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionLayout {
    pub collection: &'static str,
    pub system: &'static str,
    pub code_field: &'static str,
    pub display_field: &'static str,
}

impl CollectionLayout {
    pub fn for_ontology(ontology: Ontology) -> Self {
        let (code_field, display_field) = match ontology {
            Ontology::Snomedct => ("concept_id", "preferredTerm"),
            Ontology::Radlex => ("_id", "preferredLabel"),
            Ontology::AnatomicLocations => ("_id", "description"),
        };
        Self {
            collection: ontology.id(),
            system: ontology.system_name(),
            code_field,
            display_field,
        }
    }

    fn project(&self, score_meta: &str) -> Document {
        doc! {
            "$project": {
                "_id": 0,
                "system": { "$literal": self.system },
                "code": { "$toString": format!("${}", self.code_field) },
                "display": { "$ifNull": [format!("${}", self.display_field), ""] },
                "score": { "$meta": score_meta },
            }
        }
    }
}

/// Full-text search over every indexed field, capped at `count`.
pub fn text_search_pipeline(layout: &CollectionLayout, query: &str, count: usize) -> Vec<Document> {
    vec![
        doc! {
            "$search": {
                "index": TEXT_SEARCH_INDEX,
                "text": { "query": query, "path": { "wildcard": "*" } },
            }
        },
        doc! { "$limit": bson_int(count) },
        layout.project("searchScore"),
    ]
}

/// Approximate nearest-neighbour search against the embedding field.
pub fn vector_search_pipeline(
    layout: &CollectionLayout,
    query_vector: &[f32],
    count: usize,
) -> Vec<Document> {
    let query_vector: Vec<f64> = query_vector.iter().map(|&v| f64::from(v)).collect();
    vec![
        doc! {
            "$vectorSearch": {
                "index": VECTOR_SEARCH_INDEX,
                "path": EMBEDDING_FIELD,
                "queryVector": query_vector,
                "numCandidates": bson_int(count.saturating_mul(COUNT_TO_CANDIDATES_RATIO)),
                "limit": bson_int(count),
            }
        },
        layout.project("vectorSearchScore"),
    ]
}

/// BSON has no unsigned integers; counts saturate at `i64::MAX`.
fn bson_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
