//! Configuration management for the Vassago CLI.
//!
//! Configuration is loaded from (in order of precedence):
//! 1. Command-line arguments
//! 2. Environment variables (VASSAGO_*)
//! 3. Config file (~/.config/vassago/config.toml, or --config)
//! 4. Default values

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{bail, eyre, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use marbas::{VisionConfig, VisionKind};
use orobas::{BackendConfig, BackendKind};
use paimon::{ChunkingStrategy, EmbeddingConfig, EmbeddingKind};
use serde::{Deserialize, Serialize};

/// How extracted text is cut into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMode {
    /// Fixed character windows with overlap.
    #[default]
    Fixed,
    /// Whole sentences packed up to `chunk_size`.
    Sentence,
}

/// Effective service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server host.
    pub server_host: String,
    /// Server port.
    pub server_port: u16,
    /// Enable permissive CORS.
    pub cors: bool,
    /// Where uploaded files are stored.
    pub upload_dir: PathBuf,
    /// Knowledge base snapshot file. In-memory only when unset.
    pub store_path: Option<PathBuf>,
    /// Model loaded at startup.
    pub default_model: Option<String>,
    /// Model names clients may load.
    pub available_models: Vec<String>,
    /// Load models in quantized form.
    pub use_quantization: bool,
    /// Initial system prompt. Built-in prompt when unset.
    pub system_prompt: Option<String>,
    /// Chunks retrieved per query.
    pub top_k: usize,
    /// Chunking mode.
    pub chunking: ChunkingMode,
    /// Chunk length in characters. The upper bound in sentence mode.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks (fixed mode).
    pub chunk_overlap: usize,
    /// Length a sentence chunk grows to before it may be closed.
    pub min_chunk_size: usize,
    /// Embedder.
    pub embedding: EmbeddingKind,
    /// Embedding vector length.
    pub embedding_dimension: usize,
    /// OpenAI-compatible server for the remote embedder.
    pub embedding_url: String,
    /// Embedding model name on that server.
    pub embedding_model: String,
    /// Bearer token for the remote embedder.
    pub embedding_api_key: Option<String>,
    /// Generation backend.
    pub backend: BackendKind,
    /// OpenAI-compatible server for the remote backend.
    pub backend_url: String,
    /// Bearer token for the remote backend.
    pub backend_api_key: Option<String>,
    /// Vision backend.
    pub vision: VisionKind,
    /// OpenAI-compatible server for the remote vision backend.
    pub vision_url: String,
    /// Vision model name on that server.
    pub vision_model: String,
    /// Bearer token for the remote vision backend.
    pub vision_api_key: Option<String>,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            cors: true,
            upload_dir: PathBuf::from("./uploads"),
            store_path: None,
            default_model: Some("qwen2.5-0.5b-instruct".to_string()),
            available_models: vec![
                "qwen2.5-0.5b-instruct".to_string(),
                "llama-3.2-1b-instruct".to_string(),
                "phi-3-mini-4k-instruct".to_string(),
            ],
            use_quantization: true,
            system_prompt: None,
            top_k: 3,
            chunking: ChunkingMode::Fixed,
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 200,
            embedding: EmbeddingKind::Hashing,
            embedding_dimension: 384,
            embedding_url: "http://127.0.0.1:8080".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_api_key: None,
            backend: BackendKind::Remote,
            backend_url: "http://127.0.0.1:8080".to_string(),
            backend_api_key: None,
            vision: VisionKind::Basic,
            vision_url: "http://127.0.0.1:8080".to_string(),
            vision_model: "llava".to_string(),
            vision_api_key: None,
            max_upload_bytes: vassago_server::server::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Loads configuration from defaults, the config file, and the environment.
    ///
    /// An explicit `path` must exist and parse. Problems with the default
    /// file are logged and the defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if !path.exists() => {
                bail!("config file not found: {}", path.display())
            }
            Some(path) => Self::extract(path),
            None => {
                let file = Self::config_path();
                Self::extract(&file).or_else(|e| {
                    tracing::warn!(path = %file.display(), error = %e, "Ignoring config, using defaults");
                    Ok(Self::default())
                })
            }
        }
    }

    fn extract(file: &Path) -> Result<Self> {
        let config: Self = Self::figment(file)
            .extract()
            .map_err(|e| eyre!("invalid configuration ({}): {e}", file.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn figment(file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("VASSAGO_"))
    }

    /// Rejects settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than zero");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.chunking == ChunkingMode::Sentence && self.min_chunk_size > self.chunk_size {
            bail!(
                "min_chunk_size ({}) must not exceed chunk_size ({})",
                self.min_chunk_size,
                self.chunk_size
            );
        }
        if self.embedding_dimension == 0 {
            bail!("embedding_dimension must be greater than zero");
        }
        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be greater than zero");
        }
        Ok(())
    }

    /// Returns the path to the default config file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vassago")
            .join("config.toml")
    }

    /// Socket address built from host and port.
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server_host, self.server_port)
            .parse()
            .map_err(|e| eyre!("invalid listen address {}:{}: {e}", self.server_host, self.server_port))
    }

    /// Generation backend settings.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            kind: self.backend,
            url: self.backend_url.clone(),
            api_key: self.backend_api_key.clone(),
        }
    }

    /// Chunking strategy for uploaded documents.
    pub fn chunking_strategy(&self) -> ChunkingStrategy {
        match self.chunking {
            ChunkingMode::Fixed => ChunkingStrategy::FixedSize {
                size: self.chunk_size,
                overlap: self.chunk_overlap,
            },
            ChunkingMode::Sentence => ChunkingStrategy::Sentence {
                min_size: self.min_chunk_size,
                max_size: self.chunk_size,
            },
        }
    }

    /// Embedder settings.
    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            kind: self.embedding,
            dimension: self.embedding_dimension,
            url: self.embedding_url.clone(),
            model: self.embedding_model.clone(),
            api_key: self.embedding_api_key.clone(),
        }
    }

    /// Vision backend settings.
    pub fn vision_config(&self) -> VisionConfig {
        VisionConfig {
            kind: self.vision,
            url: self.vision_url.clone(),
            model: self.vision_model.clone(),
            api_key: self.vision_api_key.clone(),
        }
    }

    /// A copy safe to print, with secrets masked.
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "********".to_string());
        Self {
            backend_api_key: mask(&self.backend_api_key),
            embedding_api_key: mask(&self.embedding_api_key),
            vision_api_key: mask(&self.vision_api_key),
            ..self.clone()
        }
    }
}

/// Prints the effective configuration and its sources.
pub fn show_config(config: &Config, file: Option<&Path>) -> Result<()> {
    let path = file.map_or_else(Config::config_path, Path::to_path_buf);

    println!("Vassago Configuration");
    println!("=====================\n");
    println!("Config file: {}", path.display());
    if path.exists() {
        println!("Status: Found\n");
    } else {
        println!("Status: Not found (using defaults)\n");
    }

    println!("Effective settings:\n");
    println!("{}", toml::to_string_pretty(&config.redacted())?);

    println!("Environment variables override any key, e.g.:");
    println!("  VASSAGO_SERVER_PORT=9000");
    println!("  VASSAGO_BACKEND_URL=http://localhost:8080");
    println!("  VASSAGO_EMBEDDING=remote VASSAGO_EMBEDDING_MODEL=nomic-embed-text");
    println!("  VASSAGO_STORE_PATH=./data/knowledge.json");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.backend, BackendKind::Remote);
        assert_eq!(config.embedding, EmbeddingKind::Hashing);
        assert_eq!(config.chunking, ChunkingMode::Fixed);
        assert!(config.use_quantization);
        assert!(config.validate().is_ok());
        assert_eq!(config.addr().unwrap().port(), 8000);
    }

    #[test]
    fn test_file_and_env_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "vassago.toml",
                r#"
                    server_port = 9100
                    top_k = 5
                    backend = "echo"
                    chunking = "sentence"
                    available_models = ["echo-a", "echo-b"]
                "#,
            )?;
            jail.set_env("VASSAGO_TOP_K", "7");
            jail.set_env("VASSAGO_EMBEDDING", "remote");

            let config = Config::load(Some(Path::new("vassago.toml")))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.server_port, 9100);
            assert_eq!(config.top_k, 7);
            assert_eq!(config.backend, BackendKind::Echo);
            assert_eq!(config.embedding, EmbeddingKind::Remote);
            assert_eq!(config.available_models, vec!["echo-a", "echo-b"]);
            assert_eq!(config.chunk_size, 1000);
            assert_eq!(
                config.chunking_strategy(),
                ChunkingStrategy::Sentence {
                    min_size: 200,
                    max_size: 1000
                }
            );
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_validate_chunking() {
        let config = Config {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            chunking: ChunkingMode::Sentence,
            chunk_size: 100,
            chunk_overlap: 10,
            min_chunk_size: 150,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_embedding_config() {
        let config = Config {
            embedding: EmbeddingKind::Remote,
            embedding_dimension: 768,
            embedding_api_key: Some("key".to_string()),
            ..Config::default()
        };
        let embedding = config.embedding_config();
        assert_eq!(embedding.kind, EmbeddingKind::Remote);
        assert_eq!(embedding.dimension, 768);
        assert_eq!(embedding.model, "nomic-embed-text");
        assert_eq!(embedding.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_redacted() {
        let config = Config {
            backend_api_key: Some("secret".to_string()),
            embedding_api_key: Some("secret".to_string()),
            ..Config::default()
        };
        let shown = config.redacted();
        assert_eq!(shown.backend_api_key.as_deref(), Some("********"));
        assert_eq!(shown.embedding_api_key.as_deref(), Some("********"));
        assert_eq!(shown.vision_api_key, None);
    }
}
