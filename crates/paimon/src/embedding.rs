//! Text embedding.

use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use ahash::RandomState;
use async_trait::async_trait;
use orobas::OpenAiClient;
use serde::{Deserialize, Serialize};
use vassago_core::{Error, Result};

use crate::remote::RemoteEmbedder;

/// Trait for embedding models.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generates embeddings for the given texts.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generates a single embedding.
    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed(&[text]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::retrieval("No embedding generated"))
    }

    /// Returns the embedding dimension.
    fn dimension(&self) -> usize;

    /// Returns the model name.
    fn model_name(&self) -> &str;
}

/// A deterministic embedder that hashes word tokens into a fixed-size vector.
///
/// This is lexical rather than semantic, but it needs no model download and
/// gives identical vectors for identical text on every run.
pub struct HashingEmbedder {
    dimension: usize,
    hasher: RandomState,
}

impl HashingEmbedder {
    /// Smallest supported dimension.
    pub const MIN_DIMENSION: usize = 8;
    /// Largest supported dimension.
    pub const MAX_DIMENSION: usize = 4096;

    /// Creates a hashing embedder; the dimension is clamped to a sane range.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.clamp(Self::MIN_DIMENSION, Self::MAX_DIMENSION),
            hasher: RandomState::with_seeds(
                0x7661_7373_6167_6f00,
                0x7061_696d_6f6e_0001,
                0x6368_756e_6b73_0002,
                0x7665_6374_6f72_0003,
            ),
        }
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = self.hasher.build_hasher();
        token.hash(&mut hasher);
        (hasher.finish() % self.dimension as u64) as usize
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in Self::tokens(text) {
            vector[self.bucket(&token)] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashing-bow"
    }
}

/// Which embedder to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    /// Offline lexical hashing.
    #[default]
    Hashing,
    /// OpenAI-compatible `/v1/embeddings` server.
    Remote,
}

/// Embedder settings.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingConfig {
    /// Embedder kind.
    pub kind: EmbeddingKind,
    /// Vector length.
    pub dimension: usize,
    /// Server base URL (remote only).
    pub url: String,
    /// Model name on the server (remote only).
    pub model: String,
    /// Bearer token (remote only).
    pub api_key: Option<String>,
}

/// Builds the embedder for `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client for a remote embedder cannot be built.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Ok(match config.kind {
        EmbeddingKind::Hashing => Arc::new(HashingEmbedder::new(config.dimension)),
        EmbeddingKind::Remote => Arc::new(RemoteEmbedder::new(
            OpenAiClient::new(config.url.clone(), config.api_key.clone())?,
            config.model.clone(),
            config.dimension,
        )),
    })
}

/// Normalizes a vector to unit length in place. Zero vectors are left as is.
pub fn normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

/// Computes cosine similarity between two vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 1e-10 && norm_b > 1e-10 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hashing_embedder_shape() {
        let embedder = HashingEmbedder::new(64);
        let embeddings = embedder.embed(&["hello", "world"]).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 64);
        assert_eq!(embeddings[1].len(), 64);
    }

    #[tokio::test]
    async fn test_hashing_embedder_deterministic() {
        let a = HashingEmbedder::new(128).embed_single("Rust ownership").await.unwrap();
        let b = HashingEmbedder::new(128).embed_single("Rust ownership").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::new(128);
        let a = embedder.embed_single("Hello, World!").await.unwrap();
        let b = embedder.embed_single("hello world").await.unwrap();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unit_length() {
        let embedder = HashingEmbedder::default();
        let v = embedder.embed_single("the quick brown fox").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let empty = embedder.embed_single("   ").await.unwrap();
        assert!(empty.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_build_embedder() {
        let hashing = build_embedder(&EmbeddingConfig {
            dimension: 32,
            ..EmbeddingConfig::default()
        })
        .unwrap();
        assert_eq!(hashing.model_name(), "hashing-bow");
        assert_eq!(hashing.dimension(), 32);

        let remote = build_embedder(&EmbeddingConfig {
            kind: EmbeddingKind::Remote,
            dimension: 768,
            url: "http://127.0.0.1:8080".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
        })
        .unwrap();
        assert_eq!(remote.model_name(), "nomic-embed-text");
        assert_eq!(remote.dimension(), 768);
    }

    #[test]
    fn test_dimension_clamped() {
        assert_eq!(HashingEmbedder::new(0).dimension(), HashingEmbedder::MIN_DIMENSION);
        assert_eq!(
            HashingEmbedder::new(1 << 20).dimension(),
            HashingEmbedder::MAX_DIMENSION
        );
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 1e-6);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 1e-6);

        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }
}
