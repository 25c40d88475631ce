use super::endpoint_url;
use crate::traits::{GenerationBackend, GenerationRequest};
use crate::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.1:8b";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_k: 40,
            top_p: 0.9,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    error: Option<String>,
}

/// Local generation through an Ollama runtime.
pub struct OllamaBackend {
    endpoint: Url,
    model: String,
    options: SamplingOptions,
    client: Client,
}

impl OllamaBackend {
    pub fn new(endpoint: &str, model: impl Into<String>) -> Result<Self, GenerationError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            model: model.into(),
            options: SamplingOptions::default(),
            client: Client::new(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the runtime answers its model listing endpoint.
    pub async fn is_available(&self) -> bool {
        let Ok(url) = endpoint_url(&self.endpoint, "api/tags") else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Names of the models the runtime has pulled.
    pub async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        let response = self
            .client
            .get(endpoint_url(&self.endpoint, "api/tags")?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/models")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|model| model.pointer("/name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn local_prompt(query: &str, context: &str) -> String {
    format!(
        "You are an expert educational assistant. Based on the following context from the user's study materials, please provide a comprehensive answer to their question.

CONTEXT FROM STUDY MATERIALS:
{context}

USER'S QUESTION: {query}

Please provide a detailed, accurate answer based on the provided context. If the context doesn't contain enough information to fully answer the question, please indicate what specific information is missing and provide a general explanation based on your knowledge.

Structure your response to be clear and educational:"
    )
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(endpoint_url(&self.endpoint, "api/generate")?)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: local_prompt(request.query, request.context),
                stream: false,
                options: self.options,
            })
            .send()
            .await?;

        let status = response.status();
        let parsed: GenerateResponse = response.json().await?;

        if !status.is_success() {
            return Err(GenerationError::BackendResponse {
                backend: "ollama".to_string(),
                details: parsed.error.unwrap_or_else(|| status.to_string()),
            });
        }

        parsed.response.ok_or_else(|| GenerationError::BackendResponse {
            backend: "ollama".to_string(),
            details: "response field missing".to_string(),
        })
    }
}
