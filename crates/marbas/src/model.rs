//! The vision model seam and backend selection.

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use orobas::OpenAiClient;
use serde::{Deserialize, Serialize};
use vassago_core::Result;

use crate::basic::BasicVision;
use crate::remote::RemoteVision;

/// Describes images and answers questions about them.
///
/// Images are shared so implementations can move pixel work onto the
/// blocking pool.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Produces a short caption, optionally steered by a hint.
    async fn caption(&self, image: Arc<DynamicImage>, hint: Option<&str>) -> Result<String>;

    /// Answers a natural-language question about the image.
    async fn answer(&self, image: Arc<DynamicImage>, question: &str) -> Result<String>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Which vision backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionKind {
    /// Offline pixel statistics.
    #[default]
    Basic,
    /// OpenAI-compatible vision-language model.
    Remote,
}

/// Vision backend settings.
#[derive(Debug, Clone, Default)]
pub struct VisionConfig {
    /// Backend kind.
    pub kind: VisionKind,
    /// Server base URL (remote only).
    pub url: String,
    /// Model name on the server (remote only).
    pub model: String,
    /// Bearer token (remote only).
    pub api_key: Option<String>,
}

/// Builds the vision model for `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client for a remote backend cannot be built.
pub fn build_vision(config: &VisionConfig) -> Result<Arc<dyn VisionModel>> {
    Ok(match config.kind {
        VisionKind::Basic => Arc::new(BasicVision::new()),
        VisionKind::Remote => Arc::new(RemoteVision::new(
            OpenAiClient::new(config.url.clone(), config.api_key.clone())?,
            config.model.clone(),
        )),
    })
}
