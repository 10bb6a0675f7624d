//! Concrete [`ConceptRepository`](crate::repository::ConceptRepository)
//! implementations.

pub mod atlas;
pub mod pipeline;

pub use atlas::{AtlasConfig, AtlasRepository};
pub use pipeline::CollectionLayout;
