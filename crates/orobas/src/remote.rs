//! Models hosted by an OpenAI-compatible server.

use std::sync::Arc;

use async_trait::async_trait;
use vassago_core::{Error, GenerationParams, ModelId, Result, TextStream};

use crate::client::{ChatMessage, ChatRequest, OpenAiClient};
use crate::model::{LanguageModel, ModelLoader};
use crate::prompt::Prompt;

/// Loads models by asking the server whether it serves them.
pub struct RemoteLoader {
    client: OpenAiClient,
}

impl RemoteLoader {
    /// Creates a loader for the given client.
    #[must_use]
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModelLoader for RemoteLoader {
    async fn load(&self, model_id: &ModelId, quantized: bool) -> Result<Arc<dyn LanguageModel>> {
        let served = self
            .client
            .list_models()
            .await
            .map_err(|e| Error::model_load(model_id.as_str(), e.to_string()))?;

        if !served.iter().any(|m| m == model_id.as_str()) {
            return Err(Error::model_load(
                model_id.as_str(),
                format!(
                    "not served by {}; available: {}",
                    self.client.base_url(),
                    served.join(", ")
                ),
            ));
        }

        // Quantization is chosen by whoever launched the server.
        tracing::info!(
            model = %model_id,
            backend = self.client.base_url(),
            quantized,
            "Attached to remote model"
        );

        Ok(Arc::new(RemoteModel {
            client: self.client.clone(),
            id: model_id.clone(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}

/// A model served over the OpenAI chat completions API.
pub struct RemoteModel {
    client: OpenAiClient,
    id: ModelId,
}

impl RemoteModel {
    fn request(&self, prompt: &Prompt, params: GenerationParams) -> ChatRequest {
        ChatRequest {
            model: self.id.as_str().to_string(),
            messages: vec![
                ChatMessage::system(prompt.system.clone()),
                ChatMessage::user(prompt.user_message()),
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        }
    }
}

#[async_trait]
impl LanguageModel for RemoteModel {
    fn model_id(&self) -> &ModelId {
        &self.id
    }

    async fn generate(&self, prompt: &Prompt, params: GenerationParams) -> Result<String> {
        self.client.chat(&self.request(prompt, params)).await
    }

    async fn generate_stream(
        &self,
        prompt: &Prompt,
        params: GenerationParams,
    ) -> Result<TextStream> {
        self.client.chat_stream(&self.request(prompt, params)).await
    }
}
