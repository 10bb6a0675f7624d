//! Wiring: build the search capabilities from [`AppConfig`].

use std::sync::Arc;

use oidm_search::{
    AtlasRepository, CachedEmbedder, Orchestrator, RelevanceFilter, Repositories, SearchConfig,
};

use crate::config::AppConfig;
use crate::error::{OidmError, Result};
use crate::openai::{self, OpenAiEmbedder, OpenAiRelevanceJudge};

/// The configured orchestrator plus the optional relevance filter.
#[derive(Debug, Clone)]
pub struct Services {
    pub orchestrator: Orchestrator,
    filter: Option<RelevanceFilter>,
}

impl Services {
    /// Build services backed by Atlas and OpenAI.
    ///
    /// Without an OpenAI key the orchestrator has no embedder: text searches
    /// work, vector searches fail with a configuration error.
    ///
    /// # Errors
    ///
    /// Returns an error if the Atlas settings are incomplete or a client
    /// cannot be built.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = config.search.call_timeout();
        let repositories = AtlasRepository::registry(&config.atlas, timeout).await?;
        let client = if config.openai.has_api_key() {
            Some(openai::build_client(timeout)?)
        } else {
            tracing::debug!("no OpenAI key configured, vector search and filtering disabled");
            None
        };
        Self::assemble(repositories, client, config)
    }

    /// Build services over caller-supplied repositories.
    ///
    /// # Errors
    ///
    /// Returns an error if the search configuration is invalid.
    pub fn assemble(
        repositories: Repositories,
        openai_client: Option<reqwest::Client>,
        config: &AppConfig,
    ) -> Result<Self> {
        let search: SearchConfig = config.search.clone();
        let mut orchestrator = Orchestrator::new(repositories, search)?;
        let mut filter = None;

        if let Some(client) = openai_client {
            let embedder = Arc::new(OpenAiEmbedder::new(client.clone(), &config.openai));
            orchestrator =
                orchestrator.with_embedder(CachedEmbedder::from_config(embedder, &config.search));
            let judge = Arc::new(OpenAiRelevanceJudge::new(client, &config.openai));
            filter = Some(RelevanceFilter::new(judge, &config.search));
        }

        Ok(Self {
            orchestrator,
            filter,
        })
    }

    /// The relevance filter.
    ///
    /// # Errors
    ///
    /// Returns [`OidmError::Config`] if no OpenAI key is configured.
    pub fn filter(&self) -> Result<&RelevanceFilter> {
        self.filter.as_ref().ok_or_else(|| {
            OidmError::Config(format!(
                "relevance filtering requires {}",
                crate::config::ENV_OPENAI_API_KEY
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oidm_search::{ConceptRepository, SearchError, SearchResult};

    struct NoHits;

    #[async_trait::async_trait]
    impl ConceptRepository for NoHits {
        async fn text_search(&self, _q: &str, _c: usize) -> std::result::Result<Vec<SearchResult>, SearchError> {
            Ok(vec![])
        }

        async fn vector_search(
            &self,
            _v: &[f32],
            _c: usize,
        ) -> std::result::Result<Vec<SearchResult>, SearchError> {
            Ok(vec![])
        }
    }

    fn repos() -> Repositories {
        Repositories::from_fn(|_| Arc::new(NoHits))
    }

    #[test]
    fn without_openai_there_is_no_embedder_or_filter() {
        let services = Services::assemble(repos(), None, &AppConfig::default()).expect("services");
        assert!(!services.orchestrator.has_embedder());
        let err = services.filter().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn with_openai_client_everything_is_wired() {
        let services = Services::assemble(repos(), Some(reqwest::Client::new()), &AppConfig::default())
            .expect("services");
        assert!(services.orchestrator.has_embedder());
        assert!(services.filter().is_ok());
    }

    #[tokio::test]
    async fn from_config_requires_atlas_dsn() {
        let err = Services::from_config(&AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, OidmError::Search(SearchError::Configuration(_))));
        assert!(err.to_string().contains("ATLAS_DSN"));
    }

    #[tokio::test]
    async fn from_config_without_openai_is_text_only() {
        let mut config = AppConfig::default();
        config.atlas.dsn = "mongodb://127.0.0.1:27017".into();
        let services = Services::from_config(&config).await.expect("services");
        assert!(!services.orchestrator.has_embedder());
    }
}
