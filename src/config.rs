//! Configuration types for the oidm host.
//!
//! [`AppConfig`] is read from an optional TOML file and then overridden
//! from the process environment. It is built once at start-up and passed
//! explicitly to whatever needs it.

use std::path::{Path, PathBuf};

use oidm_search::{AtlasConfig, SearchConfig};
use serde::{Deserialize, Serialize};

use crate::error::{OidmError, Result};

/// Environment variables that override file settings.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ATLAS_DSN: &str = "ATLAS_DSN";
pub const ENV_DATABASE_NAME: &str = "DATABASE_NAME";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Search orchestration settings.
    pub search: SearchConfig,
    /// OpenAI embedding and chat settings.
    pub openai: OpenAiConfig,
    /// Atlas cluster connection.
    pub atlas: AtlasConfig,
}

/// OpenAI API settings shared by the embedder and the relevance judge.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL (defaults to `https://api.openai.com`).
    pub base_url: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Requested embedding length; must match the stored concept vectors.
    pub embedding_dimensions: usize,
    /// Chat model used by the relevance judge.
    pub chat_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".into(),
            embedding_model: "text-embedding-3-large".into(),
            embedding_dimensions: 1536,
            chat_model: "gpt-4o-mini".into(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("chat_model", &self.chat_model)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| OidmError::Config(e.to_string()))
    }

    /// Load the file at `path` if given, otherwise defaults, then apply the
    /// process environment and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment-style lookups. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_OPENAI_API_KEY) {
            self.openai.api_key = v;
        }
        if let Some(v) = get(ENV_ATLAS_DSN) {
            self.atlas.dsn = v;
        }
        if let Some(v) = get(ENV_DATABASE_NAME) {
            self.atlas.database = v;
        }
    }

    /// Validate configuration values.
    ///
    /// Credentials are not checked here; they are only required by the
    /// commands that use them.
    ///
    /// # Errors
    ///
    /// Returns [`OidmError::Config`] for out-of-range values and
    /// [`OidmError::Search`] for invalid search settings.
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        if self.openai.embedding_dimensions == 0 {
            return Err(OidmError::Config(
                "openai.embedding_dimensions must be greater than 0".into(),
            ));
        }
        if self.atlas.database.trim().is_empty() {
            return Err(OidmError::Config("atlas.database must not be empty".into()));
        }
        Ok(())
    }

    /// Load a `.env` file into the process environment.
    ///
    /// With an explicit `path` the file must exist. Without one, a `.env`
    /// in the current directory or its parents is loaded if present.
    ///
    /// # Errors
    ///
    /// Returns [`OidmError::Config`] if an explicit file cannot be loaded.
    pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>> {
        match path {
            Some(path) => dotenvy::from_path(path)
                .map(|()| Some(path.to_path_buf()))
                .map_err(|e| OidmError::Config(format!("{}: {e}", path.display()))),
            None => Ok(dotenvy::dotenv().ok()),
        }
    }
}
