//! CLI command implementations.

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{bail, eyre, Result};
use indicatif::{ProgressBar, ProgressStyle};
use orobas::GenerationManager;
use paimon::{Chunker, DocumentProcessor, InMemoryStore, KnowledgeBase};
use vassago_server::{AppState, Server, ServerConfig};

use crate::config::Config;

/// Listen overrides given on the command line.
#[derive(Debug, Default)]
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model: Option<String>,
}

async fn build_knowledge(config: &Config) -> Result<KnowledgeBase> {
    let embedder = paimon::build_embedder(&config.embedding_config())?;
    let store = Arc::new(InMemoryStore::new());
    Ok(match &config.store_path {
        Some(path) => KnowledgeBase::open(embedder, store, path.clone()).await?,
        None => KnowledgeBase::new(embedder, store),
    })
}

fn build_documents(config: &Config) -> DocumentProcessor {
    let chunker = Chunker::new(config.chunking_strategy());
    DocumentProcessor::new(config.upload_dir.clone(), chunker)
}

/// Wires every component described by `config` into server state.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let loader = orobas::build_loader(&config.backend_config(), &config.available_models)?;
    let mut generation = GenerationManager::new(
        loader,
        config.available_models.clone(),
        config.use_quantization,
    );
    if let Some(prompt) = &config.system_prompt {
        generation = generation.with_system_prompt(prompt.clone());
    }

    let vision = marbas::build_vision(&config.vision_config())?;

    tracing::debug!(
        backend = ?config.backend,
        embedding = ?config.embedding,
        vision = vision.name(),
        store = ?config.store_path,
        "Components configured"
    );

    Ok(AppState::new(
        generation,
        build_knowledge(config).await?,
        build_documents(config),
        vision,
        config.top_k,
    ))
}

/// Start the RAG server.
pub async fn serve(mut config: Config, overrides: ServeOverrides) -> Result<()> {
    if let Some(host) = overrides.host {
        config.server_host = host;
    }
    if let Some(port) = overrides.port {
        config.server_port = port;
    }
    if let Some(model) = overrides.model {
        config.default_model = Some(model);
    }
    config.validate()?;

    tracing::info!("Starting Vassago server...");

    let mut builder = ServerConfig::builder()
        .addr(config.addr()?)
        .cors(config.cors)
        .max_upload_bytes(config.max_upload_bytes);
    if let Some(model) = &config.default_model {
        builder = builder.default_model(model.clone());
    }

    let state = build_state(&config).await?;
    Server::new(builder.build(), state).run().await?;

    Ok(())
}

/// Parse local files into the persistent knowledge base.
///
/// Every file is attempted. The command fails afterwards if any did.
pub async fn ingest(config: &Config, files: Vec<PathBuf>) -> Result<()> {
    if files.is_empty() {
        bail!("no files given");
    }
    let Some(store_path) = &config.store_path else {
        bail!("ingest needs a persistent store; set store_path in the config or VASSAGO_STORE_PATH");
    };

    let knowledge = build_knowledge(config).await?;
    let documents = build_documents(config);

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| eyre!("invalid progress template: {e}"))?
            .progress_chars("=> "),
    );

    let mut total = 0;
    let mut failed = Vec::new();
    for file in &files {
        progress.set_message(file.display().to_string());
        let result = match documents.parse(file).await {
            Ok(chunks) => knowledge.add(chunks).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(added) => total += added,
            Err(e) => {
                progress.println(format!("  failed: {} ({e})", file.display()));
                failed.push(file.clone());
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    println!(
        "Ingested {} chunks from {} file(s) into {}",
        total,
        files.len() - failed.len(),
        store_path.display()
    );
    println!("Knowledge base now holds {} chunks", knowledge.count().await?);

    if !failed.is_empty() {
        bail!("{} file(s) could not be ingested", failed.len());
    }
    Ok(())
}

/// Display version and component info.
pub fn version() {
    println!("Vassago {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Components:");
    println!("  Paimon   - Documents and retrieval");
    println!("  Orobas   - Answer generation");
    println!("  Marbas   - Image understanding");
    println!("  Server   - HTTP API");
}

#[cfg(test)]
mod tests {
    use super::*;

    use orobas::BackendKind;
    use paimon::ChunkingStrategy;

    use crate::config::ChunkingMode;

    #[tokio::test]
    async fn test_build_state_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            upload_dir: dir.path().join("uploads"),
            backend_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };

        let state = build_state(&config).await.unwrap();
        assert!(!state.generation.is_loaded());
        assert_eq!(state.top_k, 3);
        assert_eq!(state.vision.name(), "basic");
        assert_eq!(state.knowledge.count().await.unwrap(), 0);

        // The default backend is remote, so a real model name is never
        // answered offline.
        assert!(state.generation.load("qwen2.5-0.5b-instruct").await.is_err());
        assert!(!state.generation.is_loaded());
    }

    #[tokio::test]
    async fn test_build_state_echo_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            upload_dir: dir.path().join("uploads"),
            backend: BackendKind::Echo,
            default_model: Some("echo-tiny".to_string()),
            available_models: vec!["echo-tiny".to_string()],
            ..Config::default()
        };

        let state = build_state(&config).await.unwrap();
        state.generation.load("echo-tiny").await.unwrap();
        assert!(state.generation.is_loaded());
    }

    #[test]
    fn test_sentence_chunking_selected() {
        let config = Config {
            chunking: ChunkingMode::Sentence,
            chunk_size: 40,
            chunk_overlap: 0,
            min_chunk_size: 10,
            ..Config::default()
        };
        assert_eq!(
            config.chunking_strategy(),
            ChunkingStrategy::Sentence {
                min_size: 10,
                max_size: 40
            }
        );
        let chunks = Chunker::new(config.chunking_strategy())
            .split("The first sentence is here. The second one follows. A third.");
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.ends_with('.')));
    }

    #[tokio::test]
    async fn test_ingest_persists() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("notes.txt");
        tokio::fs::write(&doc, "Vassago finds lost things.").await.unwrap();

        let config = Config {
            upload_dir: dir.path().join("uploads"),
            store_path: Some(dir.path().join("kb.json")),
            ..Config::default()
        };
        ingest(&config, vec![doc]).await.unwrap();

        let reopened = build_knowledge(&config).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let hits = reopened.search("lost things", 1).await.unwrap();
        assert_eq!(hits[0].source(), "notes.txt");
    }

    #[tokio::test]
    async fn test_ingest_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        tokio::fs::write(&good, "# Title\n\nSome text.").await.unwrap();
        let bad = dir.path().join("slides.pptx");
        tokio::fs::write(&bad, b"not supported").await.unwrap();

        let config = Config {
            upload_dir: dir.path().join("uploads"),
            store_path: Some(dir.path().join("kb.json")),
            ..Config::default()
        };
        assert!(ingest(&config, vec![good, bad]).await.is_err());
        assert_eq!(build_knowledge(&config).await.unwrap().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_requires_store() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("a.txt");
        tokio::fs::write(&doc, "text").await.unwrap();
        assert!(ingest(&Config::default(), vec![doc]).await.is_err());
    }
}
