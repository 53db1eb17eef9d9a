//! Deterministic offline model.
//!
//! The echo backend answers by quoting the leading words of the retrieved
//! context. It never touches the network, so the whole service can run and be
//! tested without model weights. It only serves names starting with
//! [`ECHO_PREFIX`], so a canned answer is never reported under the name of a
//! real model.

use std::sync::Arc;

use async_trait::async_trait;
use vassago_core::{Error, GenerationParams, ModelId, Result, TextStream};

use crate::model::{LanguageModel, ModelLoader};
use crate::prompt::Prompt;

/// Words of context quoted in an answer.
const EXCERPT_WORDS: usize = 60;

/// Prefix every echo model name carries.
pub const ECHO_PREFIX: &str = "echo-";

/// Loads [`EchoModel`]s for a fixed set of `echo-*` model names.
pub struct EchoLoader {
    models: Vec<String>,
}

impl EchoLoader {
    /// Creates a loader that accepts the given model names that start with
    /// [`ECHO_PREFIX`]. Other names are never loaded.
    pub fn new(models: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            models: models.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ModelLoader for EchoLoader {
    async fn load(&self, model_id: &ModelId, quantized: bool) -> Result<Arc<dyn LanguageModel>> {
        if !model_id.as_str().starts_with(ECHO_PREFIX) {
            return Err(Error::model_load(
                model_id.as_str(),
                format!("the echo backend only serves {ECHO_PREFIX}* models"),
            ));
        }
        if !self.models.iter().any(|m| m == model_id.as_str()) {
            return Err(Error::model_load(
                model_id.as_str(),
                format!("unknown model, expected one of: {}", self.models.join(", ")),
            ));
        }

        tracing::debug!(model = %model_id, quantized, "Echo model ready");
        Ok(Arc::new(EchoModel::new(model_id.clone())))
    }

    fn backend_name(&self) -> &'static str {
        "echo"
    }
}

/// A model that answers deterministically from its prompt.
#[derive(Debug, Clone)]
pub struct EchoModel {
    id: ModelId,
}

impl EchoModel {
    /// Creates an echo model.
    #[must_use]
    pub fn new(id: ModelId) -> Self {
        Self { id }
    }

    fn answer(prompt: &Prompt, params: GenerationParams) -> String {
        let text = if prompt.has_context() {
            let excerpt = prompt
                .context
                .split_whitespace()
                .take(EXCERPT_WORDS)
                .collect::<Vec<_>>()
                .join(" ");
            format!("Based on the provided context: {excerpt}")
        } else {
            format!(
                "I have no documents to draw on for: {}",
                prompt.question.trim()
            )
        };

        text.split_whitespace()
            .take(params.max_tokens as usize)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl LanguageModel for EchoModel {
    fn model_id(&self) -> &ModelId {
        &self.id
    }

    async fn generate(&self, prompt: &Prompt, params: GenerationParams) -> Result<String> {
        Ok(Self::answer(prompt, params))
    }

    async fn generate_stream(
        &self,
        prompt: &Prompt,
        params: GenerationParams,
    ) -> Result<TextStream> {
        let answer = Self::answer(prompt, params);
        let fragments = answer.split_inclusive(' ').map(str::to_string).collect();
        Ok(TextStream::from_fragments(fragments))
    }
}
