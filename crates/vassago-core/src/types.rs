//! Common types used across the Vassago service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a model.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ModelId(pub String);

impl ModelId {
    /// Creates a new `ModelId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ModelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a request.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Creates a new random `RequestId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of retrievable text extracted from a source document.
///
/// Chunks are immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    text: String,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    index: usize,
}

impl Chunk {
    /// Creates a chunk from `source` at position `index`.
    #[must_use]
    pub fn new(text: impl Into<String>, source: impl Into<String>, index: usize) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            page: None,
            index,
        }
    }

    /// Attaches a 1-based page number.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// The chunk text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Source label (the original file name).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Page the chunk came from, if the format has pages.
    #[must_use]
    pub fn page(&self) -> Option<u32> {
        self.page
    }

    /// Position of the chunk within its document.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// How an attached image should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageMode {
    /// Answer the query as a question about the image.
    #[default]
    #[serde(rename = "question-answering", alias = "qa", alias = "vqa")]
    QuestionAnswering,
    /// Describe the image.
    #[serde(rename = "captioning", alias = "caption")]
    Captioning,
}

/// Parameters controlling a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 = greedy).
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

impl GenerationParams {
    /// Highest accepted temperature.
    pub const MAX_TEMPERATURE: f32 = 2.0;

    /// Creates generation parameters.
    #[must_use]
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
        }
    }

    /// Checks that the parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRequest`] for a zero token budget or a
    /// temperature outside `[0, 2]`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_tokens == 0 {
            return Err(crate::Error::invalid_request(
                "max_tokens must be greater than zero",
            ));
        }
        if !(0.0..=Self::MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(crate::Error::invalid_request(format!(
                "temperature must be between 0 and {}",
                Self::MAX_TEMPERATURE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_mode_aliases() {
        let qa: ImageMode = serde_json::from_str("\"qa\"").unwrap();
        assert_eq!(qa, ImageMode::QuestionAnswering);
        let full: ImageMode = serde_json::from_str("\"question-answering\"").unwrap();
        assert_eq!(full, ImageMode::QuestionAnswering);
        let caption: ImageMode = serde_json::from_str("\"caption\"").unwrap();
        assert_eq!(caption, ImageMode::Captioning);
        assert!(serde_json::from_str::<ImageMode>("\"ocr\"").is_err());
    }

    #[test]
    fn test_generation_params_validation() {
        assert!(GenerationParams::default().validate().is_ok());
        assert!(GenerationParams::new(0, 0.7).validate().is_err());
        assert!(GenerationParams::new(64, -0.1).validate().is_err());
        assert!(GenerationParams::new(64, 2.5).validate().is_err());
        assert!(GenerationParams::new(64, 0.0).validate().is_ok());
    }

    #[test]
    fn test_chunk_accessors() {
        let chunk = Chunk::new("hello", "notes.pdf", 2).with_page(4);
        assert_eq!(chunk.text(), "hello");
        assert_eq!(chunk.source(), "notes.pdf");
        assert_eq!(chunk.page(), Some(4));
        assert_eq!(chunk.index(), 2);
    }
}
