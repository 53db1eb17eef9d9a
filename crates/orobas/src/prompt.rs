//! Prompt assembly.

/// Default system instruction.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the question using \
the provided context when it is relevant. If the context does not contain the answer, say so \
instead of guessing.";

/// A prompt built from the system instruction, retrieved context, and the user's question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// System instruction.
    pub system: String,
    /// Composed context (may be empty).
    pub context: String,
    /// The user's question.
    pub question: String,
}

impl Prompt {
    /// Creates a new prompt.
    pub fn new(
        system: impl Into<String>,
        context: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            context: context.into(),
            question: question.into(),
        }
    }

    /// Returns `true` when there is context to ground the answer in.
    #[must_use]
    pub fn has_context(&self) -> bool {
        !self.context.trim().is_empty()
    }

    /// The user turn: context (if any) followed by the question.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.has_context() {
            format!("Context:\n{}\n\nQuestion: {}", self.context, self.question)
        } else {
            self.question.clone()
        }
    }

    /// Flattens the prompt into a single completion-style string.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}\n\n{}\n\nAnswer:", self.system, self.user_message())
    }
}
