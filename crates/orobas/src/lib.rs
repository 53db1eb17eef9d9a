//! # Orobas
//!
//! *"The Prince who gives true answers"*
//!
//! Orobas owns the language model used to answer queries: it loads models by
//! name through a pluggable [`ModelLoader`], tracks the process-wide system
//! prompt, and exposes whole-answer and streaming generation.
//!
//! ## Backends
//!
//! - **Remote**: any OpenAI-compatible server (llama.cpp server, vLLM, ...)
//!   hosting a local, usually quantized, model
//! - **Echo**: a deterministic offline model for development and tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod client;
pub mod echo;
pub mod manager;
pub mod model;
pub mod prompt;
pub mod remote;

pub use backend::{build_loader, BackendConfig, BackendKind};
pub use client::OpenAiClient;
pub use echo::{EchoLoader, EchoModel};
pub use manager::{GenerationManager, ModelStatus};
pub use model::{LanguageModel, ModelLoader};
pub use prompt::Prompt;
pub use remote::{RemoteLoader, RemoteModel};
