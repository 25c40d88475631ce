use crate::backends::endpoint_url;
use crate::error::EmbeddingError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT: usize = 256;
const EMBED_BATCH_SIZE: usize = 64;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Maps text to L2-normalised vectors of a fixed dimension.
///
/// Calls block; async callers should run them on a blocking worker.
pub trait Embedder: Send + Sync {
    /// Identifies the model; persisted with the index so a reload can
    /// refuse vectors produced by a different model.
    fn model_id(&self) -> String;

    fn dimensions(&self) -> usize;

    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_many(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::CountMismatch {
                expected: 1,
                actual: 0,
            })
    }
}

pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

/// Offline embedder hashing character trigrams and whole words into buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();

        for word in lowered.split_whitespace() {
            let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
            if trimmed.is_empty() {
                continue;
            }
            let bucket = bucket_for(trimmed.as_bytes(), vector.len());
            vector[bucket] += 2.0;

            let padded: Vec<char> = format!(" {trimmed} ").chars().collect();
            for window in padded.windows(3) {
                let token = window.iter().collect::<String>();
                let bucket = bucket_for(token.as_bytes(), vector.len());
                vector[bucket] += 1.0;
            }
        }

        l2_normalize(&mut vector);
        vector
    }
}

fn bucket_for(bytes: &[u8], buckets: usize) -> usize {
    let mut hash = 1469598103934665603u64;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    (hash % buckets as u64) as usize
}

impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> String {
        format!("char-ngram-{}", self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by an Ollama server's `/api/embed` endpoint.
pub struct OllamaEmbedder {
    endpoint: Url,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, EmbeddingError> {
        let endpoint = endpoint_url(&Url::parse(base_url)?, "api/embed")?;
        let client = Client::builder().timeout(Duration::from_secs(300)).build()?;
        Ok(Self {
            endpoint,
            model: model.into(),
            dimensions,
            client,
        })
    }

    fn embed_batch(&self, batch: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&OllamaEmbedRequest {
                model: &self.model,
                input: batch,
            })
            .send()?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Backend {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: OllamaEmbedResponse = response.json()?;
        if parsed.embeddings.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: batch.len(),
                actual: parsed.embeddings.len(),
            });
        }

        parsed
            .embeddings
            .into_iter()
            .map(|mut vector| {
                if vector.len() != self.dimensions {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: vector.len(),
                    });
                }
                l2_normalize(&mut vector);
                Ok(vector)
            })
            .collect()
    }
}

impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            debug!(model = %self.model, batch = batch.len(), "requesting embeddings");
            vectors.extend(self.embed_batch(batch)?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(left: &[f32], right: &[f32]) -> f32 {
        left.iter().zip(right).map(|(a, b)| a * b).sum()
    }

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_one("Hydraulic pressure and flow").unwrap();
        let second = embedder.embed_one("Hydraulic pressure and flow").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_unit_vectors_of_expected_length() {
        let embedder = CharacterNgramEmbedder::new(32);
        let vectors = embedder.embed_many(&["abc", "binary search trees"]).unwrap();
        assert_eq!(vectors.len(), 2);
        for vector in vectors {
            assert_eq!(vector.len(), 32);
            assert!((dot(&vector, &vector) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn blank_text_embeds_to_zero_vector() {
        let embedder = CharacterNgramEmbedder::new(8);
        let vector = embedder.embed_one("   ").unwrap();
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn related_text_scores_higher_than_unrelated_text() {
        let embedder = CharacterNgramEmbedder::default();
        let query = embedder.embed_one("sorting algorithms").unwrap();
        let related = embedder.embed_one("merge sort and quick sort algorithms").unwrap();
        let unrelated = embedder.embed_one("photosynthesis in green plants").unwrap();
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn ollama_embedder_rejects_bad_base_url() {
        assert!(matches!(
            OllamaEmbedder::new("not a url", "nomic-embed-text", 768),
            Err(EmbeddingError::Url(_))
        ));
    }
}
