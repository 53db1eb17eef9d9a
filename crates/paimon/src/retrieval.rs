//! Retrieval over ingested documents.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use vassago_core::{Chunk, Error, Result};

use crate::embedding::Embedder;
use crate::store::{VectorRecord, VectorStore};

/// Texts embedded per call during ingestion.
const EMBED_BATCH_SIZE: usize = 32;

/// Embedder + vector store, with an optional JSON snapshot on disk.
///
/// The snapshot holds chunks only. Vectors are recomputed when the snapshot
/// is opened, so a snapshot survives embedder changes. Writes reach the
/// snapshot before the store: a failed write leaves both unchanged.
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    snapshot: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl KnowledgeBase {
    /// Creates a knowledge base that lives only in memory.
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            snapshot: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a knowledge base backed by a snapshot file, loading it if present.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing snapshot cannot be read or parsed.
    pub async fn open(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        snapshot: impl Into<PathBuf>,
    ) -> Result<Self> {
        let snapshot = snapshot.into();
        let kb = Self {
            embedder,
            store,
            snapshot: Some(snapshot.clone()),
            write_lock: Mutex::new(()),
        };

        match tokio::fs::read(&snapshot).await {
            Ok(bytes) => {
                let chunks: Vec<Chunk> = serde_json::from_slice(&bytes)?;
                let records = kb.embed_records(chunks).await?;
                let restored = kb.store.upsert(records).await?;
                tracing::info!(
                    path = %snapshot.display(),
                    chunks = restored,
                    "Restored knowledge base snapshot"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %snapshot.display(), "No snapshot yet, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(kb)
    }

    /// Adds chunks, returning how many were stored.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding, storing, or persisting fails.
    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let records = self.embed_records(chunks).await?;

        if self.snapshot.is_some() {
            let mut all = self.store.chunks().await?;
            all.extend(records.iter().map(|r| r.chunk.clone()));
            self.write_snapshot(&all).await?;
        }
        let added = self.store.upsert(records).await?;

        tracing::debug!(added, "Added chunks to knowledge base");
        Ok(added)
    }

    /// Returns up to `k` chunks ranked by descending similarity to `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or searched.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_single(query).await?;
        let results = self.store.search(&vector, k).await?;

        Ok(results.into_iter().map(|r| r.record.chunk).collect())
    }

    /// Returns the number of stored chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }

    /// Removes every chunk. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or its snapshot cannot be cleared.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_snapshot(&[]).await?;
        self.store.clear().await?;
        tracing::info!("Cleared knowledge base");
        Ok(())
    }

    /// Joins chunk texts in rank order, separated by blank lines.
    #[must_use]
    pub fn build_context(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(Chunk::text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn embed_records(&self, chunks: Vec<Chunk>) -> Result<Vec<VectorRecord>> {
        let mut records = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(Chunk::text).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::retrieval(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            records.extend(
                vectors
                    .into_iter()
                    .zip(batch.iter().cloned())
                    .map(|(vector, chunk)| VectorRecord::new(vector, chunk)),
            );
        }

        Ok(records)
    }

    async fn write_snapshot(&self, chunks: &[Chunk]) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let json = serde_json::to_vec(chunks)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::debug!(path = %path.display(), chunks = chunks.len(), "Wrote snapshot");
        Ok(())
    }
}
