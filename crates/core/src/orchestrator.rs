use crate::router::classify_query;
use crate::store::{RetrievalStore, DEFAULT_TOP_K};
use crate::traits::{GenerationBackend, GenerationRequest};
use crate::{GenerationError, QueryKind, RetrievalError, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const EXCERPT_CHARS: usize = 150;
const SUMMARY_INPUT_CHARS: usize = 3_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceExcerpt {
    pub filename: String,
    pub score: f32,
    pub excerpt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub response: String,
    pub sources: Vec<SourceExcerpt>,
    pub context_length: usize,
    pub kind: QueryKind,
    pub backend: String,
    /// Set when every backend failed and `response` carries the error text.
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub summary: String,
    pub document_count: usize,
    pub documents: Vec<String>,
    pub backend: String,
    pub degraded: bool,
}

struct Generated {
    response: String,
    backend: String,
    degraded: bool,
}

/// Retrieval followed by generation over a shared [`RetrievalStore`].
pub struct AnswerCoordinator {
    store: Arc<RetrievalStore>,
    local: Arc<dyn GenerationBackend>,
    remote: Option<Arc<dyn GenerationBackend>>,
    top_k: usize,
}

impl AnswerCoordinator {
    pub fn new(store: Arc<RetrievalStore>, local: Arc<dyn GenerationBackend>) -> Self {
        Self {
            store,
            local,
            remote: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn GenerationBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub async fn answer(&self, query: &str, prefer_remote: bool) -> Result<Answer, GenerationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GenerationError::InvalidRequest("query is empty".to_string()));
        }

        let results = self.retrieve(query).await?;
        let context = assemble_context(&results);
        let kind = classify_query(query);
        debug!(%kind, results = results.len(), context_len = context.len(), "retrieved context");

        let generated = self
            .generate(
                &GenerationRequest {
                    query,
                    context: &context,
                    kind,
                },
                prefer_remote,
            )
            .await;

        Ok(Answer {
            response: generated.response,
            sources: results
                .iter()
                .map(|result| SourceExcerpt {
                    filename: result.chunk.filename.clone(),
                    score: result.score,
                    excerpt: result.excerpt(EXCERPT_CHARS),
                })
                .collect(),
            context_length: context.len(),
            kind,
            backend: generated.backend,
            degraded: generated.degraded,
        })
    }

    /// Summarises the head of everything currently indexed.
    pub async fn summarize(&self, prefer_remote: bool) -> Result<Summary, GenerationError> {
        let corpus = self
            .store
            .snapshot()
            .filter(|corpus| !corpus.is_empty())
            .ok_or(RetrievalError::IndexNotBuilt)?;

        let mut seen = HashSet::new();
        let documents: Vec<String> = corpus
            .chunks()
            .iter()
            .filter(|chunk| seen.insert(chunk.filename.as_str()))
            .map(|chunk| chunk.filename.clone())
            .collect();

        let content = corpus
            .chunks()
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let head: String = content.chars().take(SUMMARY_INPUT_CHARS).collect();
        let query = format!(
            "Please provide a comprehensive summary of the following document. Focus on key points, main arguments, and important findings:\n\n{head}"
        );

        let generated = self
            .generate(
                &GenerationRequest {
                    query: &query,
                    context: "",
                    kind: QueryKind::Research,
                },
                prefer_remote,
            )
            .await;

        info!(documents = documents.len(), backend = %generated.backend, "summarised corpus");
        Ok(Summary {
            summary: generated.response,
            document_count: documents.len(),
            documents,
            backend: generated.backend,
            degraded: generated.degraded,
        })
    }

    pub async fn compare(
        &self,
        first: &str,
        second: &str,
        prefer_remote: bool,
    ) -> Result<Answer, GenerationError> {
        let (first, second) = (first.trim(), second.trim());
        if first.is_empty() || second.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "both concepts are required".to_string(),
            ));
        }

        let query = format!(
            "Compare and contrast {first} and {second}. Discuss their similarities, differences, advantages, disadvantages, and use cases."
        );
        self.answer(&query, prefer_remote).await
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>, GenerationError> {
        let store = Arc::clone(&self.store);
        let query = query.to_string();
        let top_k = self.top_k;

        let results = tokio::task::spawn_blocking(move || store.search(&query, top_k))
            .await
            .map_err(|error| GenerationError::Worker(error.to_string()))??;
        Ok(results)
    }

    /// Remote first when asked for and configured, then local. Never fails:
    /// a local failure becomes a degraded response.
    async fn generate(&self, request: &GenerationRequest<'_>, prefer_remote: bool) -> Generated {
        if prefer_remote {
            match &self.remote {
                Some(remote) => match remote.generate(request).await {
                    Ok(response) => {
                        return Generated {
                            response,
                            backend: remote.name(),
                            degraded: false,
                        }
                    }
                    Err(error) => {
                        warn!(backend = %remote.name(), %error, "remote generation failed, falling back to local");
                    }
                },
                None => debug!("remote backend not configured, using local"),
            }
        }

        match self.local.generate(request).await {
            Ok(response) => Generated {
                response,
                backend: self.local.name(),
                degraded: false,
            },
            Err(error) => {
                warn!(backend = %self.local.name(), %error, "local generation failed");
                Generated {
                    response: format!("Error with local model: {error}"),
                    backend: self.local.name(),
                    degraded: true,
                }
            }
        }
    }
}

/// One block per result, most relevant first, separated by blank lines.
pub fn assemble_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| {
            format!(
                "From {} (relevance: {:.3}):\n{}",
                result.chunk.filename, result.score, result.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
