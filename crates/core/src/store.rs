use crate::chunking::{chunk_words, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, RetrievalError};
use crate::index::FlatIndex;
use crate::models::{ChunkRecord, Document, IndexStatus, IndexingSummary, SearchResult};
use crate::persist::{load_artifacts, save_artifacts, ArtifactPaths};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug)]
pub struct IndexedCorpus {
    index: FlatIndex,
    chunks: Vec<ChunkRecord>,
}

impl IndexedCorpus {
    pub fn new(index: FlatIndex, chunks: Vec<ChunkRecord>) -> Result<Self, RetrievalError> {
        if index.len() != chunks.len() {
            return Err(RetrievalError::CorruptArtifact(format!(
                "index holds {} vectors but metadata holds {} chunks",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self { index, chunks })
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

pub struct RetrievalStore {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    corpus: RwLock<Option<Arc<IndexedCorpus>>>,
    writer: Mutex<()>,
}

impl RetrievalStore {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
    ) -> Result<Self, RetrievalError> {
        chunking.validate()?;
        Ok(Self {
            embedder,
            chunking,
            corpus: RwLock::new(None),
            writer: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Option<Arc<IndexedCorpus>> {
        self.corpus.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.corpus.read().is_some()
    }

    pub fn chunk_count(&self) -> usize {
        self.snapshot().map_or(0, |corpus| corpus.len())
    }

    /// Distinct filenames in slot order.
    pub fn filenames(&self) -> Vec<String> {
        let Some(corpus) = self.snapshot() else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        corpus
            .chunks()
            .iter()
            .filter(|chunk| seen.insert(chunk.filename.as_str()))
            .map(|chunk| chunk.filename.clone())
            .collect()
    }

    pub fn status(&self) -> IndexStatus {
        let corpus = self.snapshot();
        IndexStatus {
            loaded: corpus.is_some(),
            chunk_count: corpus.as_ref().map_or(0, |corpus| corpus.len()),
            dimension: corpus.as_ref().map(|corpus| corpus.index().dimension()),
            embedder: self.embedder.model_id(),
            documents: self.filenames(),
        }
    }

    /// Replaces the whole corpus. On failure the previous one stays published.
    pub fn index_documents(
        &self,
        documents: &[Document],
    ) -> Result<IndexingSummary, RetrievalError> {
        let _writer = self.writer.lock();

        let mut chunks = Vec::new();
        for document in documents {
            let pieces = chunk_words(&document.raw_content, self.chunking)?;
            debug!(
                document_id = %document.id,
                filename = %document.filename,
                chunk_count = pieces.len(),
                "chunked document"
            );
            chunks.extend(
                pieces
                    .into_iter()
                    .enumerate()
                    .map(|(position, text)| ChunkRecord {
                        document_id: document.id.clone(),
                        filename: document.filename.clone(),
                        text,
                        chunk_index: position as u64,
                    }),
            );
        }

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_many(&texts)?
        };
        if vectors.len() != chunks.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            }
            .into());
        }

        let index = FlatIndex::build(self.embedder.dimensions(), &vectors)?;
        let corpus = IndexedCorpus::new(index, chunks)?;
        let summary = IndexingSummary {
            documents: documents.len(),
            chunks: corpus.len(),
        };

        *self.corpus.write() = Some(Arc::new(corpus));
        info!(
            documents = summary.documents,
            chunks = summary.chunks,
            embedder = %self.embedder.model_id(),
            "published rebuilt index"
        );
        Ok(summary)
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, RetrievalError> {
        let Some(corpus) = self.snapshot() else {
            return Ok(Vec::new());
        };
        if corpus.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_one(query)?;
        let k_search = k.saturating_mul(2).min(corpus.len());
        let neighbors = corpus.index().query(&query_vector, k_search)?;

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(k);
        for neighbor in neighbors {
            let Some(chunk) = corpus.chunks().get(neighbor.slot) else {
                continue;
            };
            if !seen.insert(chunk.text.as_str()) {
                continue;
            }
            results.push(SearchResult {
                chunk: chunk.clone(),
                score: normalized_score(neighbor.score),
            });
            if results.len() >= k {
                break;
            }
        }

        results.sort_by(|left, right| right.score.total_cmp(&left.score));
        Ok(results)
    }

    pub fn persist(&self, path: &Path) -> Result<(), RetrievalError> {
        let corpus = self.snapshot().ok_or(RetrievalError::IndexNotBuilt)?;
        let paths = ArtifactPaths::new(path);
        let header = save_artifacts(
            &paths,
            &self.embedder.model_id(),
            corpus.index(),
            corpus.chunks(),
        )?;
        info!(
            path = %path.display(),
            chunks = header.slot_count,
            dimension = header.dimension,
            "persisted index"
        );
        Ok(())
    }

    /// `false` keeps the current corpus.
    pub fn reload(&self, path: &Path) -> bool {
        let paths = ArtifactPaths::new(path);
        if !paths.index_exists() || !paths.metadata_exists() {
            warn!(path = %path.display(), "index artifacts not found");
            return false;
        }

        let loaded = match load_artifacts(&paths) {
            Ok(loaded) => loaded,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to load index artifacts");
                return false;
            }
        };

        let model_id = self.embedder.model_id();
        if loaded.header.embedder != model_id
            || loaded.header.dimension != self.embedder.dimensions()
        {
            warn!(
                path = %path.display(),
                stored = %loaded.header.embedder,
                stored_dimension = loaded.header.dimension,
                current = %model_id,
                "index was built with a different embedder"
            );
            return false;
        }

        let corpus = match IndexedCorpus::new(loaded.index, loaded.chunks) {
            Ok(corpus) => corpus,
            Err(error) => {
                warn!(path = %path.display(), %error, "loaded index is inconsistent");
                return false;
            }
        };

        let _writer = self.writer.lock();
        let chunk_count = corpus.len();
        *self.corpus.write() = Some(Arc::new(corpus));
        info!(path = %path.display(), chunks = chunk_count, "loaded index");
        true
    }
}

/// Maps an inner product in `[-1, 1]` to a confidence in `[0, 1]`.
pub fn normalized_score(raw: f32) -> f32 {
    ((raw + 1.0) / 2.0).clamp(0.0, 1.0)
}
