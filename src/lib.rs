//! oidm: hybrid ontology search host.
//!
//! Loads configuration, connects the [`oidm_search`] orchestrator to
//! MongoDB Atlas and OpenAI, and exposes the pieces the `oidm` binary uses.

pub mod config;
pub mod error;
pub mod openai;
pub mod services;

pub use config::AppConfig;
pub use error::{OidmError, Result};
pub use services::Services;
