use crate::error::RetrievalError;
use crate::index::FlatIndex;
use crate::models::ChunkRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const INDEX_FILE: &str = "index.bin";
pub const METADATA_FILE: &str = "documents.json";
pub const FORMAT_VERSION: u32 = 1;

pub struct ArtifactPaths {
    pub root: PathBuf,
}

impl ArtifactPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn index(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn metadata(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn index_exists(&self) -> bool {
        self.index().is_file()
    }

    pub fn metadata_exists(&self) -> bool {
        self.metadata().is_file()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHeader {
    pub format_version: u32,
    pub embedder: String,
    pub dimension: usize,
    pub slot_count: usize,
    pub metadata_sha256: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexArtifact {
    header: IndexHeader,
    index: FlatIndex,
}

#[derive(Debug)]
pub struct LoadedArtifacts {
    pub header: IndexHeader,
    pub index: FlatIndex,
    pub chunks: Vec<ChunkRecord>,
}

pub fn save_artifacts(
    paths: &ArtifactPaths,
    embedder: &str,
    index: &FlatIndex,
    chunks: &[ChunkRecord],
) -> Result<IndexHeader, RetrievalError> {
    fs::create_dir_all(&paths.root)?;

    let metadata = serde_json::to_vec(chunks)?;
    let header = IndexHeader {
        format_version: FORMAT_VERSION,
        embedder: embedder.to_string(),
        dimension: index.dimension(),
        slot_count: index.len(),
        metadata_sha256: digest(&metadata),
        created_at: Utc::now(),
    };

    let artifact = IndexArtifact {
        header,
        index: index.clone(),
    };
    let encoded = bincode::serialize(&artifact)?;

    write_atomically(&paths.metadata(), &metadata)?;
    write_atomically(&paths.index(), &encoded)?;

    Ok(artifact.header)
}

pub fn load_artifacts(paths: &ArtifactPaths) -> Result<LoadedArtifacts, RetrievalError> {
    for path in [paths.index(), paths.metadata()] {
        if !path.is_file() {
            return Err(RetrievalError::Persistence {
                path: path.display().to_string(),
                details: "artifact is missing".to_string(),
            });
        }
    }

    let metadata = fs::read(paths.metadata())?;
    let encoded = fs::read(paths.index())?;
    let artifact: IndexArtifact = bincode::deserialize(&encoded)?;
    let header = artifact.header;

    if header.format_version != FORMAT_VERSION {
        return Err(RetrievalError::CorruptArtifact(format!(
            "unsupported format version {}",
            header.format_version
        )));
    }
    if header.metadata_sha256 != digest(&metadata) {
        return Err(RetrievalError::CorruptArtifact(
            "metadata checksum does not match the index header".to_string(),
        ));
    }

    artifact.index.validate()?;
    let chunks: Vec<ChunkRecord> = serde_json::from_slice(&metadata)?;

    if header.dimension != artifact.index.dimension() {
        return Err(RetrievalError::CorruptArtifact(format!(
            "header dimension {} but index dimension {}",
            header.dimension,
            artifact.index.dimension()
        )));
    }
    if header.slot_count != artifact.index.len() || chunks.len() != artifact.index.len() {
        return Err(RetrievalError::CorruptArtifact(format!(
            "header lists {} slots, index holds {}, metadata holds {}",
            header.slot_count,
            artifact.index.len(),
            chunks.len()
        )));
    }

    Ok(LoadedArtifacts {
        header,
        index: artifact.index,
        chunks,
    })
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), RetrievalError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| RetrievalError::Persistence {
            path: path.display().to_string(),
            details: "artifact path has no file name".to_string(),
        })?;
    // Unique per call so concurrent writers to one root never share a staging file.
    let staging = path.with_file_name(format!("{file_name}.{}.tmp", Uuid::new_v4()));

    let mut file = File::create(&staging)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&staging, path)?;
    Ok(())
}
