//! Search orchestrator: concurrent fan-out, normalization, fusion.
//!
//! This module fans out queries to the ontology repositories concurrently,
//! rescales each method's scores independently, and merges the lists in a
//! fixed positional order. The fuser combines per-method scores for the
//! interactive display path.

pub mod fusion;
pub mod normalize;
pub mod search;

pub use fusion::{fuse, FusionTable};
pub use normalize::normalize;
pub use search::Orchestrator;
