//! # Vassago Server
//!
//! HTTP API for document ingestion and retrieval-augmented question answering.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, Server, ServerConfig};
