use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extensions accepted for upload. `pptx` is accepted but has no extractor.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "docx", "doc", "txt", "pptx"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Docx,
    Txt,
}

impl SourceType {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }
}

pub fn is_supported_extension(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(extension))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub raw_content: String,
    pub source_type: SourceType,
}

impl Document {
    pub fn new(
        filename: impl Into<String>,
        raw_content: impl Into<String>,
        source_type: SourceType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            raw_content: raw_content.into(),
            source_type,
        }
    }
}

/// Metadata stored for one index slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    pub document_id: String,
    pub filename: String,
    pub text: String,
    pub chunk_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub chunk: ChunkRecord,
    pub score: f32,
}

impl SearchResult {
    /// First `max_chars` characters of the chunk followed by an ellipsis.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let head: String = self.chunk.text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IndexingSummary {
    pub documents: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub loaded: bool,
    pub chunk_count: usize,
    pub dimension: Option<usize>,
    pub embedder: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size_words: usize,
    pub chunk_overlap_words: usize,
    pub max_file_bytes: u64,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size_words: 1_000,
            chunk_overlap_words: 200,
            max_file_bytes: 50 * 1024 * 1024,
        }
    }
}
