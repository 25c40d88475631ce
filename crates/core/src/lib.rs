pub mod backends;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod persist;
pub mod router;
pub mod store;
pub mod traits;

pub use backends::{OllamaBackend, PerplexityBackend, SamplingOptions, TierModels};
pub use chunking::{chunk_words, ChunkingConfig};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbeddingError, GenerationError, IngestError, RetrievalError};
pub use extractor::{extract_page_texts, extract_text, ExtractedText, PageText, PdfExtractor};
pub use index::{FlatIndex, Neighbor};
pub use ingest::{
    discover_supported_files, expand_inputs, load_document, load_documents_best_effort,
    LoadReport, SkippedFile,
};
pub use models::{
    ChunkRecord, Document, IndexStatus, IndexingSummary, IngestionOptions, SearchResult,
    SourceType, SUPPORTED_EXTENSIONS,
};
pub use orchestrator::{assemble_context, Answer, AnswerCoordinator, SourceExcerpt, Summary};
pub use persist::{ArtifactPaths, IndexHeader};
pub use router::{classify_query, QueryKind};
pub use store::{normalized_score, IndexedCorpus, RetrievalStore, DEFAULT_TOP_K};
pub use traits::{GenerationBackend, GenerationRequest};
