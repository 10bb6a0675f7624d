//! OpenAI relevance judge.
//!
//! Each [`FilterPass`] is one Chat Completions call in JSON mode. The model
//! sees the query and the candidate concepts and must answer with
//! `{"concepts": [{"system": ..., "code": ..., "display": ...}, ...]}`.

use async_trait::async_trait;
use oidm_search::{ConceptRef, FilterPass, RelevanceJudge, SearchError};
use serde::Deserialize;

use crate::config::OpenAiConfig;

use super::{describe_http_error, endpoint};

const MATCHED_PROMPT: &str = "You review candidate concepts from medical ontologies \
(SNOMED CT, RadLex, anatomic locations) for a radiology search query. Return only the \
candidates that name the same thing as the query: exact matches, synonyms, or the same \
finding or structure under another label. Copy system, code and display exactly as given. \
Answer with a JSON object of the form {\"concepts\": [...]}; use an empty list if none match.";

const RELATED_PROMPT: &str = "You review candidate concepts from medical ontologies \
(SNOMED CT, RadLex, anatomic locations) for a radiology search query. Return only the \
candidates that are closely related to the query without naming the same thing: broader or \
narrower terms, parts, locations, or findings that commonly accompany it. Copy system, code \
and display exactly as given. Answer with a JSON object of the form {\"concepts\": [...]}; \
use an empty list if none are related.";

/// System prompt for one relevance pass.
pub fn system_prompt(pass: FilterPass) -> &'static str {
    match pass {
        FilterPass::Matched => MATCHED_PROMPT,
        FilterPass::Related => RELATED_PROMPT,
    }
}

/// Build the JSON request body for one relevance pass.
///
/// # Errors
///
/// Returns [`SearchError::Filter`] if the candidates cannot be serialized.
pub fn build_judge_request(
    model: &str,
    pass: FilterPass,
    candidates: &[ConceptRef],
    query: &str,
) -> Result<serde_json::Value, SearchError> {
    let listing = serde_json::to_string(candidates)
        .map_err(|e| SearchError::Filter(format!("cannot serialize candidates: {e}")))?;
    Ok(serde_json::json!({
        "model": model,
        "temperature": 0,
        "response_format": {"type": "json_object"},
        "messages": [
            {"role": "system", "content": system_prompt(pass)},
            {"role": "user", "content": format!("Query: {query}\n\nCandidates:\n{listing}")},
        ],
    }))
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConceptsAnswer {
    concepts: Vec<ConceptRef>,
}

/// Parse the model's message content into concept references.
///
/// # Errors
///
/// Returns [`SearchError::Filter`] if `content` is not a `{"concepts": [...]}`
/// object.
pub fn parse_concepts(pass: FilterPass, content: &str) -> Result<Vec<ConceptRef>, SearchError> {
    serde_json::from_str::<ConceptsAnswer>(content)
        .map(|answer| answer.concepts)
        .map_err(|e| SearchError::Filter(format!("{pass} pass returned malformed output: {e}")))
}

/// A [`RelevanceJudge`] backed by an OpenAI chat model.
pub struct OpenAiRelevanceJudge {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiRelevanceJudge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiRelevanceJudge")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiRelevanceJudge {
    pub fn new(client: reqwest::Client, config: &OpenAiConfig) -> Self {
        Self {
            client,
            url: endpoint(&config.base_url, "/v1/chat/completions"),
            api_key: config.api_key.clone(),
            model: config.chat_model.clone(),
        }
    }
}

#[async_trait]
impl RelevanceJudge for OpenAiRelevanceJudge {
    async fn judge(
        &self,
        pass: FilterPass,
        candidates: &[ConceptRef],
        query: &str,
    ) -> Result<Vec<ConceptRef>, SearchError> {
        let body = build_judge_request(&self.model, pass, candidates, query)?;

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Filter(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(SearchError::Filter(describe_http_error(status, &body_text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Filter(format!("OpenAI response unreadable: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SearchError::Filter(format!("{pass} pass returned no content")))?;

        let concepts = parse_concepts(pass, &content)?;
        tracing::debug!(%pass, returned = concepts.len(), "relevance pass answered");
        Ok(concepts)
    }
}
