//! Request and response bodies.

use orobas::ModelStatus;
use serde::{Deserialize, Serialize};
use vassago_core::ImageMode;

fn default_use_rag() -> bool {
    true
}

fn default_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.7
}

/// Body of `/query` and `/query/stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// The question.
    pub query: String,
    /// Model the caller expects to answer. Must match the loaded model.
    #[serde(default)]
    pub model_name: Option<String>,
    /// Whether to retrieve document context.
    #[serde(default = "default_use_rag")]
    pub use_rag: bool,
    /// Token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Optional base64 image (raw or `data:` URI).
    #[serde(default)]
    pub image_base64: Option<String>,
    /// How to interpret the image.
    #[serde(default)]
    pub image_mode: ImageMode,
}

/// Body returned by `/query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    /// Generated answer.
    pub answer: String,
    /// Model that produced the answer.
    pub model_used: String,
    /// Source labels of the retrieved chunks, in rank order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

/// Body returned by `/`.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    /// Service name.
    pub message: &'static str,
    /// Always `running`.
    pub status: &'static str,
    /// Main endpoints.
    pub available_endpoints: Vec<&'static str>,
}

/// Body returned by `/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` when the process answers.
    pub status: &'static str,
    /// Whether a model is ready.
    pub model_loaded: bool,
    /// Chunks in the knowledge base.
    pub documents_count: usize,
}

/// Body returned by `/models`.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    /// Loaded model, if any.
    pub current_model: Option<String>,
    /// Model names clients may load.
    pub available_models: Vec<String>,
    /// Whether models load quantized.
    pub use_quantization: bool,
    /// Current system prompt.
    pub system_prompt: String,
    /// Lifecycle state.
    pub model_state: ModelStatus,
}

/// Body returned by `GET /system-prompt`.
#[derive(Debug, Serialize)]
pub struct SystemPromptResponse {
    /// Current system prompt.
    pub system_prompt: String,
}

/// Form accepted by `POST /system-prompt`.
#[derive(Debug, Deserialize)]
pub struct SystemPromptForm {
    /// New system prompt.
    pub prompt: String,
}

/// Body returned by `POST /system-prompt`.
#[derive(Debug, Serialize)]
pub struct SystemPromptUpdated {
    /// Confirmation.
    pub message: &'static str,
    /// The prompt now in effect.
    pub new_prompt: String,
}

/// Query string of `POST /models/load`.
#[derive(Debug, Deserialize)]
pub struct LoadModelParams {
    /// Model to load.
    pub model_name: String,
}

/// Generic confirmation body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable message.
    pub message: String,
}

/// Body returned by `/upload`.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Confirmation.
    pub message: &'static str,
    /// Stored file name.
    pub filename: String,
    /// Chunks added to the knowledge base.
    pub chunks_created: usize,
}

/// Body returned by `/upload-image`.
#[derive(Debug, Serialize)]
pub struct ImageUploadResponse {
    /// Stored file name.
    pub filename: String,
    /// Generated caption.
    pub caption: String,
}
