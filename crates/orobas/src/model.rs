//! Model traits.

use std::sync::Arc;

use async_trait::async_trait;
use vassago_core::{GenerationParams, ModelId, Result, TextStream};

use crate::prompt::Prompt;

/// A loaded language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier the model was loaded under.
    fn model_id(&self) -> &ModelId;

    /// Generates a complete answer.
    async fn generate(&self, prompt: &Prompt, params: GenerationParams) -> Result<String>;

    /// Generates an answer incrementally.
    ///
    /// Concatenating every fragment must equal what [`LanguageModel::generate`]
    /// would return for a deterministic model.
    async fn generate_stream(&self, prompt: &Prompt, params: GenerationParams)
        -> Result<TextStream>;
}

/// Loads models by name.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Loads `model_id`, optionally in quantized form.
    ///
    /// Implementations return [`vassago_core::Error::ModelLoad`] for unknown
    /// identifiers, unreachable backends, or unusable weights.
    async fn load(&self, model_id: &ModelId, quantized: bool) -> Result<Arc<dyn LanguageModel>>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
