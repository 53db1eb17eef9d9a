//! Minimal client for OpenAI-compatible inference servers.
//!
//! Covers the endpoints Vassago needs: `GET /v1/models` to check that a
//! model is served, `POST /v1/chat/completions` in both whole and
//! server-sent-event form, and `POST /v1/embeddings`. Message content may
//! carry `image_url` parts so the same client serves vision models.

use std::fmt::Display;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use vassago_core::{Error, Result, TextStream};

/// A chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// `system`, `user`, or `assistant`.
    pub role: &'static str,
    /// Message content.
    pub content: MessageContent,
}

impl ChatMessage {
    /// A system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    /// A plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user message carrying an image (as a data URI or URL) and a text part.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
                ContentPart::Text { text: text.into() },
            ]),
        }
    }
}

/// Message content: a plain string or a list of typed parts.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Multimodal parts.
    Parts(Vec<ContentPart>),
}

/// A typed content part.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text part.
    Text {
        /// The text.
        text: String,
    },
    /// Image part.
    ImageUrl {
        /// The image reference.
        image_url: ImageUrl,
    },
}

/// Image reference inside a content part.
#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    /// `data:` URI or remote URL.
    pub url: String,
}

/// Body of a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model name as served by the backend.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to stream the answer.
    pub stream: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingList {
    data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEntry {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Completion {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible server.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Creates a client for the server at `base_url` (without the `/v1` suffix).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Lists the model identifiers the server hosts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] if the server is unreachable or answers
    /// with an error.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .authorize(self.http.get(self.endpoint("models")))
            .send()
            .await
            .map_err(|e| Error::generation(format!("backend unreachable: {e}")))?;
        let response = check_status(response).await?;

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("malformed model list: {e}")))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Runs a chat completion and returns the full answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] on transport, status, or decoding failures.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let body = ChatRequest {
            stream: false,
            ..request.clone()
        };
        let response = self.send_chat(&body).await?;

        let completion: Completion = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("malformed completion: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| Error::generation("backend returned no choices"))
    }

    /// Runs a streaming chat completion, yielding text fragments as they arrive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] if the request is rejected. Failures after
    /// the stream starts surface as stream items.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream> {
        let body = ChatRequest {
            stream: true,
            ..request.clone()
        };
        let response = self.send_chat(&body).await?;
        Ok(TextStream::new(sse_fragments(response.bytes_stream())))
    }

    /// Embeds `inputs` with `model`, returning one vector per input in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retrieval`] on transport, status, or decoding failures,
    /// or when the server returns the wrong number of vectors.
    pub async fn embeddings(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .authorize(self.http.post(self.endpoint("embeddings")))
            .json(&EmbeddingRequest { model, input: inputs })
            .send()
            .await
            .map_err(|e| Error::retrieval(format!("embedding server unreachable: {e}")))?;
        let response = check_status(response)
            .await
            .map_err(|e| Error::retrieval(e.to_string()))?;

        let mut list: EmbeddingList = response
            .json()
            .await
            .map_err(|e| Error::retrieval(format!("malformed embedding response: {e}")))?;
        if list.data.len() != inputs.len() {
            return Err(Error::retrieval(format!(
                "embedding server returned {} vectors for {} inputs",
                list.data.len(),
                inputs.len()
            )));
        }

        list.data.sort_by_key(|entry| entry.index);
        Ok(list.data.into_iter().map(|entry| entry.embedding).collect())
    }

    async fn send_chat(&self, body: &ChatRequest) -> Result<reqwest::Response> {
        let response = self
            .authorize(self.http.post(self.endpoint("chat/completions")))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::generation(format!("backend unreachable: {e}")))?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::generation(format!("backend returned {status}: {body}")))
}

/// Meaning of one server-sent event's data.
#[derive(Debug, PartialEq)]
pub(crate) enum SseData {
    Fragment(String),
    Done,
    Failed(String),
    Skip,
}

pub(crate) fn parse_event_data(data: &str) -> SseData {
    let data = data.trim();
    if data == "[DONE]" {
        return SseData::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(StreamChunk {
            error: Some(error), ..
        }) => SseData::Failed(error.to_string()),
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|text| !text.is_empty())
            .map_or(SseData::Skip, SseData::Fragment),
        Err(e) => {
            tracing::warn!(error = %e, data, "Skipping unparseable stream event");
            SseData::Skip
        }
    }
}

/// Turns an SSE byte stream into text fragments.
///
/// Ends at `[DONE]`, or after yielding the first error.
fn sse_fragments<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let events = Box::pin(bytes.eventsource());

    futures::stream::unfold(Some(events), |events| async move {
        let mut events = events?;
        loop {
            match events.next().await? {
                Ok(event) => match parse_event_data(&event.data) {
                    SseData::Fragment(text) => return Some((Ok(text), Some(events))),
                    SseData::Done => return None,
                    SseData::Failed(message) => {
                        let error = Error::generation(format!("backend error: {message}"));
                        return Some((Err(error), None));
                    }
                    SseData::Skip => {}
                },
                Err(e) => {
                    let error = Error::generation(format!("stream interrupted: {e}"));
                    return Some((Err(error), None));
                }
            }
        }
    })
}
