//! Embeddings from an OpenAI-compatible server.

use async_trait::async_trait;
use orobas::OpenAiClient;
use vassago_core::{Error, Result};

use crate::embedding::{normalize, Embedder};

/// Calls `POST /v1/embeddings` (llama.cpp server, Ollama, vLLM, ...).
///
/// Vectors are L2-normalised so scores are comparable with the hashing
/// embedder.
pub struct RemoteEmbedder {
    client: OpenAiClient,
    model: String,
    dimension: usize,
}

impl RemoteEmbedder {
    /// Creates an embedder for `model`, which must produce `dimension`-length vectors.
    #[must_use]
    pub fn new(client: OpenAiClient, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.client.embeddings(&self.model, texts).await?;
        for vector in &mut vectors {
            if vector.len() != self.dimension {
                return Err(Error::retrieval(format!(
                    "{} returned {}-dimensional vectors, expected {}",
                    self.model,
                    vector.len(),
                    self.dimension
                )));
            }
            normalize(vector);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
