//! # Paimon
//!
//! *"The King who teaches all arts and sciences"*
//!
//! Paimon is the knowledge engine for Vassago: it turns uploaded files into
//! chunks, embeds them, and answers similarity searches over them.
//!
//! ## Features
//!
//! - **Document Processing**: PDF, plain text, and DOCX extraction
//! - **Chunking**: Deterministic fixed-size and sentence strategies
//! - **Embedding**: Offline hashing or an OpenAI-compatible embedding server
//! - **Retrieval**: Cosine-ranked vector search with optional JSON snapshots

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunker;
pub mod document;
pub mod embedding;
pub mod formats;
pub mod remote;
pub mod retrieval;
pub mod store;

pub use chunker::{Chunker, ChunkingStrategy};
pub use document::{DocumentFormat, DocumentProcessor};
pub use embedding::{build_embedder, Embedder, EmbeddingConfig, EmbeddingKind, HashingEmbedder};
pub use remote::RemoteEmbedder;
pub use retrieval::KnowledgeBase;
pub use store::{InMemoryStore, SearchResult, VectorRecord, VectorStore};
