//! Vision-language models behind an OpenAI-compatible server.

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use orobas::client::{ChatMessage, ChatRequest};
use orobas::OpenAiClient;
use vassago_core::{Error, Result};

use crate::decode::encode_png_data_uri;
use crate::model::VisionModel;

const CAPTION_PROMPT: &str = "Describe this image in one or two sentences.";
const MAX_TOKENS: u32 = 256;
const TEMPERATURE: f32 = 0.2;

/// Sends images as PNG data URIs to a hosted vision-language model.
pub struct RemoteVision {
    client: OpenAiClient,
    model: String,
}

impl RemoteVision {
    /// Creates a remote vision model.
    #[must_use]
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    async fn ask(&self, image: Arc<DynamicImage>, text: String) -> Result<String> {
        let data_uri = tokio::task::spawn_blocking(move || encode_png_data_uri(&image))
            .await
            .map_err(|e| Error::vision(format!("image encoding crashed: {e}")))??;
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user_with_image(text, data_uri)],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            stream: false,
        };

        let answer = self
            .client
            .chat(&request)
            .await
            .map_err(|e| Error::vision(e.to_string()))?;
        Ok(answer.trim().to_string())
    }
}

#[async_trait]
impl VisionModel for RemoteVision {
    async fn caption(&self, image: Arc<DynamicImage>, hint: Option<&str>) -> Result<String> {
        let text = match hint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hint) => format!("{CAPTION_PROMPT} Focus on: {hint}"),
            None => CAPTION_PROMPT.to_string(),
        };
        self.ask(image, text).await
    }

    async fn answer(&self, image: Arc<DynamicImage>, question: &str) -> Result<String> {
        self.ask(image, question.to_string()).await
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_base64, tests::solid_base64};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    /// Checks the multimodal message shape and replies with the text part.
    async fn completions(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(body["model"], "llava");
        assert_eq!(body["stream"], false);
        let parts = body["messages"][0]["content"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(parts[0]["type"], "image_url");
        let url = parts[0]["image_url"]["url"].as_str().unwrap_or_default();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(parts[1]["type"], "text");

        let text = parts[1]["text"].as_str().unwrap_or_default();
        let content = format!("  {text}\n");
        Json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        }))
    }

    async fn fake_server() -> String {
        let app = Router::new().route("/v1/chat/completions", post(completions));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn image() -> Arc<DynamicImage> {
        Arc::new(decode_base64(&solid_base64(8, 8, [30, 60, 200])).unwrap())
    }

    #[tokio::test]
    async fn test_caption_sends_hint_with_image() {
        let client = OpenAiClient::new(fake_server().await, None).unwrap();
        let vision = RemoteVision::new(client, "llava");

        let caption = vision.caption(image(), Some(" the sky ")).await.unwrap();
        assert_eq!(caption, format!("{CAPTION_PROMPT} Focus on: the sky"));

        let plain = vision.caption(image(), Some("  ")).await.unwrap();
        assert_eq!(plain, CAPTION_PROMPT);
    }

    #[tokio::test]
    async fn test_answer_sends_question() {
        let client = OpenAiClient::new(fake_server().await, None).unwrap();
        let vision = RemoteVision::new(client, "llava");
        let answer = vision.answer(image(), "What is shown?").await.unwrap();
        assert_eq!(answer, "What is shown?");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_vision_error() {
        let client = OpenAiClient::new("http://127.0.0.1:9", None).unwrap();
        let vision = RemoteVision::new(client, "llava");
        assert!(matches!(
            vision.caption(image(), None).await,
            Err(Error::Vision { .. })
        ));
    }
}
