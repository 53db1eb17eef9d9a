//! Streaming types for incremental text generation.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::error::Result;

/// A lazy, finite stream of generated text fragments.
///
/// The stream ends (yields `None`) once generation is complete. It is consumed
/// exactly once; dropping it abandons whatever work is still pending.
pub struct TextStream {
    inner: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
}

impl TextStream {
    /// Creates a new `TextStream` from any fragment stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Creates a stream over already-known fragments.
    #[must_use]
    pub fn from_fragments(fragments: Vec<String>) -> Self {
        Self::new(futures::stream::iter(fragments.into_iter().map(Ok)))
    }

    /// Concatenates every fragment into a single string.
    ///
    /// # Errors
    ///
    /// Returns the first error yielded by the stream.
    pub async fn collect_text(self) -> Result<String> {
        use futures::StreamExt;
        let mut text = String::new();
        let mut stream = self;
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for TextStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for TextStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStream").finish_non_exhaustive()
    }
}
