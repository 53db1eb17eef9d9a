//! HTTP server setup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use marbas::VisionModel;
use orobas::GenerationManager;
use paimon::{DocumentProcessor, KnowledgeBase};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vassago_core::{Error, Result};

use crate::handlers;

/// Default request body cap (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: SocketAddr,
    /// Enable permissive CORS.
    pub cors: bool,
    /// Model to load at startup.
    pub default_model: Option<String>,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors: true,
            default_model: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Creates a new server config builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    addr: Option<SocketAddr>,
    cors: Option<bool>,
    default_model: Option<String>,
    max_upload_bytes: Option<usize>,
}

impl ServerConfigBuilder {
    /// Sets the listen address.
    #[must_use]
    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Sets whether CORS is enabled.
    #[must_use]
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = Some(enabled);
        self
    }

    /// Sets the model to load at startup.
    #[must_use]
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Sets the request body cap.
    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = Some(bytes);
        self
    }

    /// Builds the server config.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            addr: self.addr.unwrap_or(defaults.addr),
            cors: self.cors.unwrap_or(defaults.cors),
            default_model: self.default_model,
            max_upload_bytes: self.max_upload_bytes.unwrap_or(defaults.max_upload_bytes),
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Model lifecycle and system prompt.
    pub generation: GenerationManager,
    /// Ingested chunks.
    pub knowledge: KnowledgeBase,
    /// Upload storage and parsing.
    pub documents: DocumentProcessor,
    /// Image understanding.
    pub vision: Arc<dyn VisionModel>,
    /// Chunks retrieved per query.
    pub top_k: usize,
    /// Server start time.
    pub start_time: Instant,
}

impl AppState {
    /// Creates the application state.
    pub fn new(
        generation: GenerationManager,
        knowledge: KnowledgeBase,
        documents: DocumentProcessor,
        vision: Arc<dyn VisionModel>,
        top_k: usize,
    ) -> Self {
        Self {
            generation,
            knowledge,
            documents,
            vision,
            top_k,
            start_time: Instant::now(),
        }
    }
}

/// The HTTP server.
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Returns the shared state.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Creates the router.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/models", get(handlers::list_models))
            .route(
                "/system-prompt",
                get(handlers::get_system_prompt).post(handlers::set_system_prompt),
            )
            .route("/models/load", post(handlers::load_model))
            .route("/upload", post(handlers::upload_document))
            .route("/upload-image", post(handlers::upload_image))
            .route("/query", post(handlers::query))
            .route("/query/stream", post(handlers::query_stream))
            .route("/documents", delete(handlers::clear_documents))
            .with_state(Arc::clone(&self.state));

        router = router
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
            .layer(TraceLayer::new_for_http());

        if self.config.cors {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Loads the configured default model, if any.
    ///
    /// A failure is logged and the server keeps running without a model.
    pub async fn load_default_model(&self) {
        let Some(model) = &self.config.default_model else {
            tracing::warn!("No default model configured; load one via POST /models/load");
            return;
        };

        if let Err(e) = self.state.generation.load(model.as_str()).await {
            tracing::warn!(model = %model, error = %e, "Default model failed to load; continuing without a model");
        }
    }

    /// Runs the server until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the server fails.
    pub async fn run(self) -> Result<()> {
        self.load_default_model().await;

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.addr).await?;

        tracing::info!(
            addr = %self.config.addr,
            documents = self.state.knowledge.count().await?,
            model_loaded = self.state.generation.is_loaded(),
            "Vassago listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::internal(e.to_string()))?;

        tracing::info!(
            uptime_secs = self.state.start_time.elapsed().as_secs(),
            "Server shutdown complete"
        );
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down gracefully"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down gracefully"),
    }
}
