use super::endpoint_url;
use crate::traits::{GenerationBackend, GenerationRequest};
use crate::{GenerationError, QueryKind};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub const DEFAULT_PERPLEXITY_URL: &str = "https://api.perplexity.ai";
const PLACEHOLDER_KEY: &str = "your-perplexity-api-key";
const SYSTEM_PROMPT: &str = "You are an expert computer science educator. Provide clear, accurate explanations with examples when helpful. Be comprehensive but concise.";

#[derive(Debug, Clone, PartialEq)]
pub struct TierModels {
    pub search: String,
    pub reasoning: String,
    pub research: String,
}

impl Default for TierModels {
    fn default() -> Self {
        Self {
            search: "sonar".to_string(),
            reasoning: "sonar-reasoning".to_string(),
            research: "sonar-deep-research".to_string(),
        }
    }
}

/// Remote chat-completions backend with one model per query tier.
pub struct PerplexityBackend {
    endpoint: Url,
    api_key: String,
    models: TierModels,
    max_tokens: u32,
    client: Client,
}

impl PerplexityBackend {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        let trimmed = api_key.trim();
        if trimmed.is_empty() || trimmed == PLACEHOLDER_KEY {
            return Err(GenerationError::NotConfigured(
                "PERPLEXITY_API_KEY is not set".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            endpoint: Url::parse(DEFAULT_PERPLEXITY_URL)?,
            api_key: trimmed.to_string(),
            models: TierModels::default(),
            max_tokens: 2_000,
            client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, GenerationError> {
        self.endpoint = Url::parse(endpoint)?;
        Ok(self)
    }

    pub fn model_for(&self, kind: QueryKind) -> &str {
        match kind {
            QueryKind::Reasoning => &self.models.reasoning,
            QueryKind::Research => &self.models.research,
            QueryKind::Search => &self.models.search,
        }
    }

    fn completions_url(&self) -> Result<Url, GenerationError> {
        Ok(endpoint_url(&self.endpoint, "chat/completions")?)
    }
}

pub fn remote_prompt(query: &str, context: &str) -> String {
    if context.trim().is_empty() {
        return format!(
            "Answer the following question based on your knowledge:\n\nQUESTION: {query}\n\nPlease provide a comprehensive and accurate answer:"
        );
    }

    format!(
        "Based on the following context from the user's study materials, answer their question. If the context is insufficient, use your general knowledge to provide a helpful answer.

CONTEXT FROM UPLOADED MATERIALS:
{context}

QUESTION: {query}

Please provide a comprehensive and accurate answer:"
    )
}

#[async_trait]
impl GenerationBackend for PerplexityBackend {
    fn name(&self) -> String {
        "perplexity".to_string()
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let model = self.model_for(request.kind);
        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": remote_prompt(request.query, request.context) }
            ],
            "max_tokens": self.max_tokens,
            "temperature": 0.3,
            "top_p": 0.9,
        });

        let response = self
            .client
            .post(self.completions_url()?)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(GenerationError::BackendResponse {
                backend: format!("perplexity:{model}"),
                details: format!("{status}: {details}"),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GenerationError::BackendResponse {
                backend: format!("perplexity:{model}"),
                details: "choices[0].message.content missing".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_and_blank_keys_are_not_configured() {
        assert!(matches!(
            PerplexityBackend::new(""),
            Err(GenerationError::NotConfigured(_))
        ));
        assert!(matches!(
            PerplexityBackend::new("your-perplexity-api-key"),
            Err(GenerationError::NotConfigured(_))
        ));
    }

    #[test]
    fn tier_follows_query_kind() -> Result<(), Box<dyn std::error::Error>> {
        let backend = PerplexityBackend::new("pplx-test")?;
        assert_eq!(backend.model_for(QueryKind::Search), "sonar");
        assert_eq!(backend.model_for(QueryKind::Reasoning), "sonar-reasoning");
        assert_eq!(backend.model_for(QueryKind::Research), "sonar-deep-research");
        Ok(())
    }

    #[test]
    fn prompt_drops_context_block_when_blank() {
        let without = remote_prompt("What is paging?", "  ");
        assert!(without.starts_with("Answer the following question based on your knowledge"));
        assert!(!without.contains("CONTEXT FROM UPLOADED MATERIALS"));

        let with = remote_prompt("What is paging?", "From os.pdf (relevance: 0.812):\npages");
        assert!(with.contains("CONTEXT FROM UPLOADED MATERIALS:\nFrom os.pdf"));
        assert!(with.contains("QUESTION: What is paging?"));
    }

    #[test]
    fn completions_url_keeps_path_prefix() -> Result<(), Box<dyn std::error::Error>> {
        let backend = PerplexityBackend::new("pplx-test")?.with_endpoint("http://proxy.local/v1")?;
        assert_eq!(
            backend.completions_url()?.as_str(),
            "http://proxy.local/v1/chat/completions"
        );

        let default = PerplexityBackend::new("pplx-test")?;
        assert_eq!(
            default.completions_url()?.as_str(),
            "https://api.perplexity.ai/chat/completions"
        );
        Ok(())
    }
}
