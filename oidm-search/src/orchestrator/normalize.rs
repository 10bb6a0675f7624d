//! Min-max score normalization for a single method's result list.
//!
//! Formula: `score' = (score - min) / (max - min)`
//!
//! Each (ontology, method) list is rescaled on its own before lists are
//! concatenated. Raw scores from different methods or ontologies are on
//! unrelated scales, so the combined list is never normalized as a whole.
//!
//! When every score in a list is equal the range is zero; every score is
//! then mapped to [`DEGENERATE_SCORE`] instead of dividing by zero.

use crate::error::SearchError;
use crate::types::SearchResult;

/// Score assigned to every result when a list has a zero score range.
pub const DEGENERATE_SCORE: f64 = 1.0;

/// Rescale `results` to `[0, 1]`, preserving order and identity fields.
///
/// An empty list is returned unchanged.
///
/// # Errors
///
/// Returns [`SearchError::Normalization`] if any score is NaN or infinite,
/// or if the score range itself overflows.
pub fn normalize(results: Vec<SearchResult>) -> Result<Vec<SearchResult>, SearchError> {
    if results.is_empty() {
        return Ok(results);
    }

    if let Some(bad) = results.iter().find(|r| !r.score.is_finite()) {
        return Err(SearchError::Normalization(format!(
            "non-finite score {} for {}:{}",
            bad.score, bad.system, bad.code
        )));
    }

    let (min_score, max_score) = score_bounds(&results);
    let range = max_score - min_score;
    if !range.is_finite() {
        return Err(SearchError::Normalization(format!(
            "score range [{min_score}, {max_score}] is not representable"
        )));
    }

    let rescale = |score: f64| {
        if range > 0.0 {
            (score - min_score) / range
        } else {
            DEGENERATE_SCORE
        }
    };

    Ok(results
        .into_iter()
        .map(|mut r| {
            r.score = rescale(r.score);
            r
        })
        .collect())
}

/// Smallest and largest score in a non-empty list.
fn score_bounds(results: &[SearchResult]) -> (f64, f64) {
    results.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
        (lo.min(r.score), hi.max(r.score))
    })
}
