//! Per-request query orchestration.
//!
//! `validate -> vision -> retrieve -> compose -> generate`. Validation and
//! retrieval failures abort the request. Image problems never do: they turn
//! into a note inside the context.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use orobas::{LanguageModel, Prompt};
use paimon::KnowledgeBase;
use serde_json::json;
use vassago_core::{Chunk, Error, GenerationParams, RequestId, Result, TextStream};

use crate::api::{QueryRequest, QueryResponse};
use crate::server::AppState;

/// A validated query with its prompt assembled, ready to generate.
pub struct PreparedQuery {
    id: RequestId,
    model: Arc<dyn LanguageModel>,
    prompt: Prompt,
    params: GenerationParams,
    sources: Option<Vec<String>>,
    started: Instant,
}

/// Joins retrieved chunks and the image fragment into one context string.
#[must_use]
pub fn compose_context(chunks: &[Chunk], image_fragment: Option<&str>) -> String {
    let documents = KnowledgeBase::build_context(chunks);
    match image_fragment {
        Some(fragment) if documents.is_empty() => fragment.to_string(),
        Some(fragment) => format!("{documents}\n\n{fragment}"),
        None => documents,
    }
}

/// Runs every step before generation.
///
/// # Errors
///
/// Returns a client error for an invalid request, a missing model, or a model
/// mismatch, and a server error if retrieval fails.
pub async fn prepare(state: &AppState, request: QueryRequest) -> Result<PreparedQuery> {
    let id = RequestId::new();
    let started = Instant::now();

    if request.query.trim().is_empty() {
        return Err(Error::invalid_request("query must not be empty"));
    }
    let params = GenerationParams::new(request.max_tokens, request.temperature);
    params.validate()?;

    let model = state.generation.snapshot()?;
    if let Some(requested) = request.model_name.as_deref().filter(|m| !m.is_empty()) {
        if requested != model.model_id().as_str() {
            return Err(Error::ModelMismatch {
                requested: requested.to_string(),
                current: model.model_id().to_string(),
            });
        }
    }

    let image_fragment = match request.image_base64.as_deref().filter(|b| !b.trim().is_empty()) {
        Some(image) => Some(
            marbas::interpret(
                Arc::clone(&state.vision),
                image,
                request.image_mode,
                &request.query,
            )
            .await,
        ),
        None => None,
    };

    let chunks = if request.use_rag {
        state.knowledge.search(&request.query, state.top_k).await?
    } else {
        Vec::new()
    };
    let sources = request
        .use_rag
        .then(|| chunks.iter().map(|c| c.source().to_string()).collect());

    let context = compose_context(&chunks, image_fragment.as_deref());
    let prompt = state.generation.prompt(&request.query, &context);

    tracing::debug!(
        request_id = %id,
        model = %model.model_id(),
        use_rag = request.use_rag,
        retrieved = chunks.len(),
        has_image = image_fragment.is_some(),
        context_chars = context.len(),
        "Query prepared"
    );

    Ok(PreparedQuery {
        id,
        model,
        prompt,
        params,
        sources,
        started,
    })
}

impl PreparedQuery {
    /// Generates the whole answer.
    ///
    /// # Errors
    ///
    /// Returns the model's generation error.
    pub async fn answer(self) -> Result<QueryResponse> {
        let answer = self.model.generate(&self.prompt, self.params).await?;

        tracing::info!(
            request_id = %self.id,
            model = %self.model.model_id(),
            latency_ms = self.started.elapsed().as_millis() as u64,
            "Query answered"
        );

        Ok(QueryResponse {
            answer,
            model_used: self.model.model_id().to_string(),
            sources: self.sources,
        })
    }

    /// Starts generation and frames the fragments as server-sent events.
    ///
    /// # Errors
    ///
    /// Returns an error if generation cannot start. Later failures are sent
    /// as an `error` event.
    pub async fn stream(self) -> Result<impl Stream<Item = std::result::Result<Event, Infallible>>> {
        let fragments = self.model.generate_stream(&self.prompt, self.params).await?;
        let payloads = sse_payloads(
            fragments,
            self.sources.unwrap_or_default(),
            self.id,
            self.started,
        );
        Ok(payloads.map(|payload| Ok(Event::default().data(payload))))
    }
}

enum Phase {
    Text(TextStream),
    Sources,
    Done,
    Finished,
}

struct EventState {
    phase: Phase,
    sources: Vec<String>,
    id: RequestId,
    started: Instant,
}

/// Event payloads: `{"text"}` per fragment, then `{"sources"}` if any, then
/// `[DONE]`.
///
/// A failed fragment becomes `{"error"}` and skips straight to `[DONE]`.
/// Dropping the stream drops `fragments` with it.
fn sse_payloads(
    fragments: TextStream,
    sources: Vec<String>,
    id: RequestId,
    started: Instant,
) -> impl Stream<Item = String> {
    let state = EventState {
        phase: Phase::Text(fragments),
        sources,
        id,
        started,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            match std::mem::replace(&mut state.phase, Phase::Finished) {
                Phase::Text(mut stream) => match stream.next().await {
                    Some(Ok(text)) => {
                        state.phase = Phase::Text(stream);
                        return Some((json!({ "text": text }).to_string(), state));
                    }
                    Some(Err(e)) => {
                        tracing::warn!(request_id = %state.id, error = %e, "Stream failed mid-way");
                        state.phase = Phase::Done;
                        return Some((json!({ "error": e.to_string() }).to_string(), state));
                    }
                    None => state.phase = Phase::Sources,
                },
                Phase::Sources => {
                    state.phase = Phase::Done;
                    if !state.sources.is_empty() {
                        let payload = json!({ "sources": state.sources }).to_string();
                        return Some((payload, state));
                    }
                }
                Phase::Done => {
                    tracing::info!(
                        request_id = %state.id,
                        latency_ms = state.started.elapsed().as_millis() as u64,
                        "Stream finished"
                    );
                    return Some(("[DONE]".to_string(), state));
                }
                Phase::Finished => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn test_compose_context() {
        let chunks = vec![Chunk::new("one", "a.txt", 0), Chunk::new("two", "b.txt", 0)];
        assert_eq!(compose_context(&chunks, None), "one\n\ntwo");
        assert_eq!(
            compose_context(&chunks, Some("Image description: x")),
            "one\n\ntwo\n\nImage description: x"
        );
        assert_eq!(compose_context(&[], Some("img")), "img");
        assert_eq!(compose_context(&[], None), "");
    }

    #[tokio::test]
    async fn test_sse_events_order() {
        let fragments = TextStream::from_fragments(vec!["Hel".into(), "lo".into()]);
        let events: Vec<String> = sse_payloads(
            fragments,
            vec!["a.txt".into()],
            RequestId::new(),
            Instant::now(),
        )
        .collect()
        .await;
        assert_eq!(
            events,
            vec![
                r#"{"text":"Hel"}"#,
                r#"{"text":"lo"}"#,
                r#"{"sources":["a.txt"]}"#,
                "[DONE]",
            ]
        );
    }

    #[tokio::test]
    async fn test_sse_events_without_sources() {
        let fragments = TextStream::from_fragments(vec!["answer".into()]);
        let events: Vec<String> =
            sse_payloads(fragments, Vec::new(), RequestId::new(), Instant::now())
                .collect()
                .await;
        assert_eq!(events, vec![r#"{"text":"answer"}"#, "[DONE]"]);
    }

    #[tokio::test]
    async fn test_sse_events_error_skips_sources() {
        let fragments = TextStream::new(futures::stream::iter(vec![
            Ok("partial".to_string()),
            Err(Error::generation("backend died")),
            Ok("never sent".to_string()),
        ]));
        let events: Vec<String> = sse_payloads(
            fragments,
            vec!["a.txt".into()],
            RequestId::new(),
            Instant::now(),
        )
        .collect()
        .await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], r#"{"text":"partial"}"#);
        let error: serde_json::Value = serde_json::from_str(&events[1]).unwrap();
        assert!(error["error"].as_str().unwrap().contains("backend died"));
        assert_eq!(events[2], "[DONE]");
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dropping_events_drops_generation() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&dropped));
        let fragments = TextStream::new(
            futures::stream::iter(vec![Ok("one".to_string()), Ok("two".to_string())]).map(
                move |fragment| {
                    let _held = &flag;
                    fragment
                },
            ),
        );

        let mut events = Box::pin(sse_payloads(
            fragments,
            Vec::new(),
            RequestId::new(),
            Instant::now(),
        ));
        assert_eq!(events.next().await.unwrap(), r#"{"text":"one"}"#);
        assert!(!dropped.load(Ordering::SeqCst));

        drop(events);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
