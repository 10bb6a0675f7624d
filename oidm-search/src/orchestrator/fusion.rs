//! Text/vector result fusion for the interactive display path.
//!
//! Merges one ontology's lexical and vector result lists into a single
//! table with one row per concept, then ranks rows by
//!
//! ```text
//! combined = sqrt(text_score² + (vector_score_scale · vector_score)²)
//! ```
//!
//! Rows from earlier fusion calls can be carried forward so results from
//! several ontologies accumulate into one growing table. Carried rows keep
//! their scores; they are not re-scored.
//!
//! Ties on `combined_score` are broken by `system`, then `code`, ascending.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::DEFAULT_VECTOR_SCORE_SCALE;
use crate::types::{FusedRow, SearchResult};

/// Combine per-method scores into one ranking value.
pub fn combined_score(text_score: f64, vector_score: f64, vector_score_scale: f64) -> f64 {
    text_score.hypot(vector_score_scale * vector_score)
}

/// Fuse `text_results` and `vector_results` for a single ontology and merge
/// in `existing_rows` from previous calls.
///
/// A concept returned by both methods yields one row holding both scores.
/// A concept returned by only one method has 0 for the other score. If the
/// same concept appears more than once in `vector_results`, the last score
/// wins.
///
/// Output is sorted by `combined_score` descending.
pub fn fuse(
    text_results: Vec<SearchResult>,
    vector_results: Vec<SearchResult>,
    existing_rows: Vec<FusedRow>,
    vector_score_scale: f64,
) -> Vec<FusedRow> {
    let mut rows: Vec<FusedRow> = Vec::with_capacity(text_results.len() + vector_results.len());
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    // 1. Seed one row per text result.
    for r in text_results {
        index
            .entry((r.system.clone(), r.code.clone()))
            .or_insert(rows.len());
        rows.push(FusedRow {
            system: r.system,
            code: r.code,
            display: r.display,
            text_score: r.score,
            vector_score: 0.0,
            combined_score: 0.0,
        });
    }

    // 2. Attach vector scores, appending rows for vector-only concepts.
    for r in vector_results {
        let key = (r.system.clone(), r.code.clone());
        match index.get(&key) {
            Some(&i) => rows[i].vector_score = r.score,
            None => {
                index.insert(key, rows.len());
                rows.push(FusedRow {
                    system: r.system,
                    code: r.code,
                    display: r.display,
                    text_score: 0.0,
                    vector_score: r.score,
                    combined_score: 0.0,
                });
            }
        }
    }

    // 3. Score the new rows only.
    for row in &mut rows {
        row.combined_score = combined_score(row.text_score, row.vector_score, vector_score_scale);
    }

    // 4. Carry forward earlier rows untouched.
    rows.extend(existing_rows);

    // 5. Rank.
    rows.sort_by(compare_rows);
    rows
}

/// Descending by combined score; ties ascending by system, then code.
fn compare_rows(a: &FusedRow, b: &FusedRow) -> Ordering {
    b.combined_score
        .total_cmp(&a.combined_score)
        .then_with(|| a.system.cmp(&b.system))
        .then_with(|| a.code.cmp(&b.code))
}

/// A fused table that grows as ontologies are searched one after another.
///
/// Owned by a single request; calls to [`FusionTable::absorb`] are
/// sequential by construction (`&mut self`).
#[derive(Debug, Clone)]
pub struct FusionTable {
    rows: Vec<FusedRow>,
    vector_score_scale: f64,
}

impl Default for FusionTable {
    fn default() -> Self {
        Self::new(DEFAULT_VECTOR_SCORE_SCALE)
    }
}

impl FusionTable {
    pub fn new(vector_score_scale: f64) -> Self {
        Self {
            rows: Vec::new(),
            vector_score_scale,
        }
    }

    /// Fuse one ontology's text and vector results into the table.
    pub fn absorb(&mut self, text_results: Vec<SearchResult>, vector_results: Vec<SearchResult>) {
        let existing = std::mem::take(&mut self.rows);
        self.rows = fuse(text_results, vector_results, existing, self.vector_score_scale);
    }

    /// Current rows, best first.
    pub fn rows(&self) -> &[FusedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<FusedRow> {
        self.rows
    }
}
