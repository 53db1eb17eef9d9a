//! The process-wide generation manager.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use vassago_core::{Error, GenerationParams, ModelId, Result, TextStream};

use crate::model::{LanguageModel, ModelLoader};
use crate::prompt::{Prompt, DEFAULT_SYSTEM_PROMPT};

/// Lifecycle of the managed model.
enum ModelState {
    Unloaded,
    Loading,
    Loaded(Arc<dyn LanguageModel>),
}

/// Externally visible model state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    /// No model is available.
    Unloaded,
    /// A load is in progress.
    Loading,
    /// A model is ready.
    Loaded,
}

/// Resets the state to `Unloaded` if a load is abandoned mid-flight.
struct LoadGuard<'a> {
    state: &'a RwLock<ModelState>,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.state.write() = ModelState::Unloaded;
        }
    }
}

/// Holds at most one loaded model plus the system prompt shared by every request.
///
/// Loads are serialized. The state is replaced wholesale, so a reader sees
/// either the previous model or the new one. Requests take a [`snapshot`]
/// and keep using that model even if a reload starts while they run.
///
/// [`snapshot`]: GenerationManager::snapshot
pub struct GenerationManager {
    loader: Arc<dyn ModelLoader>,
    state: RwLock<ModelState>,
    load_lock: Mutex<()>,
    system_prompt: RwLock<String>,
    available_models: Vec<String>,
    use_quantization: bool,
}

impl GenerationManager {
    /// Creates a manager with no model loaded.
    pub fn new(
        loader: Arc<dyn ModelLoader>,
        available_models: Vec<String>,
        use_quantization: bool,
    ) -> Self {
        Self {
            loader,
            state: RwLock::new(ModelState::Unloaded),
            load_lock: Mutex::new(()),
            system_prompt: RwLock::new(DEFAULT_SYSTEM_PROMPT.to_string()),
            available_models,
            use_quantization,
        }
    }

    /// Replaces the initial system prompt.
    #[must_use]
    pub fn with_system_prompt(self, prompt: impl Into<String>) -> Self {
        *self.system_prompt.write() = prompt.into();
        self
    }

    /// Loads `model_id`, replacing any loaded model.
    ///
    /// On failure the manager is left unloaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelLoad`] if the backend cannot provide the model.
    pub async fn load(&self, model_id: impl Into<ModelId>) -> Result<()> {
        let model_id = model_id.into();
        let _serialized = self.load_lock.lock().await;

        tracing::info!(
            model = %model_id,
            backend = self.loader.backend_name(),
            quantized = self.use_quantization,
            "Loading model"
        );
        let started = std::time::Instant::now();

        *self.state.write() = ModelState::Loading;
        let mut guard = LoadGuard {
            state: &self.state,
            armed: true,
        };

        let result = self.loader.load(&model_id, self.use_quantization).await;
        guard.armed = false;

        match result {
            Ok(model) => {
                *self.state.write() = ModelState::Loaded(model);
                tracing::info!(
                    model = %model_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model loaded"
                );
                Ok(())
            }
            Err(e) => {
                *self.state.write() = ModelState::Unloaded;
                tracing::error!(model = %model_id, error = %e, "Model load failed");
                Err(match e {
                    Error::ModelLoad { .. } => e,
                    other => Error::model_load(model_id.as_str(), other.to_string()),
                })
            }
        }
    }

    /// Returns `true` if a model is ready.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.read(), ModelState::Loaded(_))
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ModelStatus {
        match *self.state.read() {
            ModelState::Unloaded => ModelStatus::Unloaded,
            ModelState::Loading => ModelStatus::Loading,
            ModelState::Loaded(_) => ModelStatus::Loaded,
        }
    }

    /// Returns the loaded model's identifier, if any.
    #[must_use]
    pub fn current_model(&self) -> Option<ModelId> {
        match &*self.state.read() {
            ModelState::Loaded(model) => Some(model.model_id().clone()),
            ModelState::Unloaded | ModelState::Loading => None,
        }
    }

    /// Model names advertised to clients.
    #[must_use]
    pub fn available_models(&self) -> &[String] {
        &self.available_models
    }

    /// Whether models are requested in quantized form.
    #[must_use]
    pub fn use_quantization(&self) -> bool {
        self.use_quantization
    }

    /// Returns the current system prompt.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        self.system_prompt.read().clone()
    }

    /// Replaces the system prompt for all subsequent generations.
    pub fn set_system_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        tracing::info!(chars = prompt.chars().count(), "System prompt updated");
        *self.system_prompt.write() = prompt;
    }

    /// Returns a handle to the loaded model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] unless a model is loaded.
    pub fn snapshot(&self) -> Result<Arc<dyn LanguageModel>> {
        match &*self.state.read() {
            ModelState::Loaded(model) => Ok(Arc::clone(model)),
            ModelState::Unloaded | ModelState::Loading => Err(Error::NotLoaded),
        }
    }

    /// Builds a prompt with the current system prompt.
    #[must_use]
    pub fn prompt(&self, query: &str, context: &str) -> Prompt {
        Prompt::new(self.system_prompt(), context, query)
    }

    /// Generates a full answer with the loaded model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] when no model is loaded, or the model's
    /// generation error.
    pub async fn generate(
        &self,
        query: &str,
        context: &str,
        params: GenerationParams,
    ) -> Result<String> {
        let model = self.snapshot()?;
        model.generate(&self.prompt(query, context), params).await
    }

    /// Starts a streaming generation with the loaded model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] when no model is loaded, or the error raised
    /// while starting the stream.
    pub async fn generate_stream(
        &self,
        query: &str,
        context: &str,
        params: GenerationParams,
    ) -> Result<TextStream> {
        let model = self.snapshot()?;
        model
            .generate_stream(&self.prompt(query, context), params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::EchoLoader;
    use async_trait::async_trait;

    fn manager() -> GenerationManager {
        GenerationManager::new(
            Arc::new(EchoLoader::new(["echo-tiny", "echo-small"])),
            vec!["echo-tiny".to_string(), "echo-small".to_string()],
            true,
        )
    }

    /// A loader that never finishes.
    struct StuckLoader;

    #[async_trait]
    impl ModelLoader for StuckLoader {
        async fn load(&self, _: &ModelId, _: bool) -> Result<Arc<dyn LanguageModel>> {
            std::future::pending().await
        }

        fn backend_name(&self) -> &'static str {
            "stuck"
        }
    }

    #[tokio::test]
    async fn test_generate_while_unloaded() {
        let manager = manager();
        assert_eq!(manager.state(), ModelStatus::Unloaded);

        let err = manager
            .generate("q", "", GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotLoaded));
        assert!(manager
            .generate_stream("q", "", GenerationParams::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_load_then_generate() {
        let manager = manager();
        manager.load("echo-tiny").await.unwrap();

        assert!(manager.is_loaded());
        assert_eq!(manager.state(), ModelStatus::Loaded);
        assert_eq!(manager.current_model(), Some(ModelId::new("echo-tiny")));

        let answer = manager
            .generate("q", "some context", GenerationParams::default())
            .await
            .unwrap();
        assert!(answer.contains("some context"));
    }

    #[tokio::test]
    async fn test_failed_load_leaves_unloaded() {
        let manager = manager();
        manager.load("echo-tiny").await.unwrap();

        let err = manager.load("missing").await.unwrap_err();
        assert!(matches!(err, Error::ModelLoad { .. }));
        assert!(!manager.is_loaded());
        assert_eq!(manager.current_model(), None);
        assert!(matches!(manager.snapshot(), Err(Error::NotLoaded)));
    }

    #[tokio::test]
    async fn test_snapshot_survives_reload() {
        let manager = manager();
        manager.load("echo-tiny").await.unwrap();
        let held = manager.snapshot().unwrap();

        manager.load("echo-small").await.unwrap();
        assert_eq!(held.model_id().as_str(), "echo-tiny");
        assert_eq!(manager.current_model(), Some(ModelId::new("echo-small")));
    }

    #[tokio::test]
    async fn test_abandoned_load_resets_state() {
        let manager = GenerationManager::new(Arc::new(StuckLoader), Vec::new(), false);

        let load = manager.load("anything");
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), load).await;
        assert!(timed_out.is_err());
        assert_eq!(manager.state(), ModelStatus::Unloaded);
    }

    #[tokio::test]
    async fn test_stream_matches_generate() {
        let manager = manager();
        manager.load("echo-tiny").await.unwrap();
        let params = GenerationParams::new(16, 0.2);

        let whole = manager.generate("q", "a b c d e", params).await.unwrap();
        let streamed = manager
            .generate_stream("q", "a b c d e", params)
            .await
            .unwrap()
            .collect_text()
            .await
            .unwrap();
        assert_eq!(streamed, whole);
    }

    #[test]
    fn test_system_prompt_accessors() {
        let manager = manager().with_system_prompt("Start.");
        assert_eq!(manager.system_prompt(), "Start.");

        manager.set_system_prompt("Answer in French.");
        assert_eq!(manager.system_prompt(), "Answer in French.");
        assert_eq!(manager.prompt("q", "").system, "Answer in French.");
    }
}
