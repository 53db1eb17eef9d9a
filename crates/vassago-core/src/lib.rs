//! # Vassago Core
//!
//! Core types shared by every Vassago crate:
//! - The unified error type and its client/server classification
//! - Document chunks, image interpretation modes, and generation parameters
//! - The text stream produced by incremental generation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod streaming;
pub mod types;

pub use error::{Error, Result};
pub use streaming::TextStream;
pub use types::*;
