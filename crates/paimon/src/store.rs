//! Vector storage backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vassago_core::{Chunk, Result};

use crate::embedding::cosine_similarity;

/// A vector record in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// The chunk the vector was computed from.
    pub chunk: Chunk,
}

impl VectorRecord {
    /// Creates a new vector record.
    #[must_use]
    pub fn new(vector: Vec<f32>, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}

/// A search result from the vector store.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched record.
    pub record: VectorRecord,
    /// Similarity score (higher = more similar).
    pub score: f32,
}

/// Trait for vector storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Appends vectors. No deduplication is performed.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize>;

    /// Returns up to `top_k` records, best match first.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Returns the total number of vectors.
    async fn count(&self) -> Result<usize>;

    /// Returns every stored chunk in insertion order.
    async fn chunks(&self) -> Result<Vec<Chunk>>;

    /// Removes every vector.
    async fn clear(&self) -> Result<()>;
}

/// In-memory vector store with brute-force cosine ranking.
pub struct InMemoryStore {
    records: parking_lot::RwLock<Vec<VectorRecord>>,
}

impl InMemoryStore {
    /// Creates a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: parking_lot::RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let count = records.len();
        self.records.write().extend(records);
        Ok(count)
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let store = self.records.read();

        let mut results: Vec<SearchResult> = store
            .iter()
            .map(|record| SearchResult {
                record: record.clone(),
                score: cosine_similarity(query, &record.vector),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    async fn chunks(&self) -> Result<Vec<Chunk>> {
        Ok(self
            .records
            .read()
            .iter()
            .map(|r| r.chunk.clone())
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(vector: Vec<f32>, text: &str) -> VectorRecord {
        VectorRecord::new(vector, Chunk::new(text, "test.txt", 0))
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStore::new();

        let records = vec![
            record(vec![1.0, 0.0, 0.0], "test 1"),
            record(vec![0.0, 1.0, 0.0], "test 2"),
        ];

        store.upsert(records).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        let results = store
            .search(&[1.0, 0.0, 0.0], 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].score > 0.99);
        assert_eq!(results[0].record.chunk.text(), "test 1");
    }

    #[tokio::test]
    async fn test_search_empty_store() {
        let store = InMemoryStore::new();
        let results = store
            .search(&[1.0, 0.0], 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_top_k() {
        let store = InMemoryStore::new();
        store
            .upsert(vec![
                record(vec![1.0, 0.0], "a"),
                record(vec![0.7, 0.7], "b"),
                record(vec![0.0, 1.0], "c"),
            ])
            .await
            .unwrap();

        let top1 = store.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].record.chunk.text(), "a");

        let top2 = store.search(&[1.0, 0.0], 2).await.unwrap();
        let texts: Vec<&str> = top2.iter().map(|r| r.record.chunk.text()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert!(store.search(&[1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = InMemoryStore::new();
        store
            .upsert(vec![
                record(vec![0.0, 1.0], "first"),
                record(vec![0.0, 1.0], "second"),
            ])
            .await
            .unwrap();
        let results = store
            .search(&[1.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(results[0].record.chunk.text(), "first");
        assert_eq!(results[1].record.chunk.text(), "second");
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryStore::new();
        store.upsert(vec![record(vec![1.0], "x")]).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.chunks().await.unwrap().is_empty());
    }
}
