use crate::{GenerationError, QueryKind};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub query: &'a str,
    /// Retrieved context; empty when nothing was retrieved.
    pub context: &'a str,
    pub kind: QueryKind,
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short label used in logs and in answers, e.g. `ollama:llama3.1:8b`.
    fn name(&self) -> String;

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError>;
}
