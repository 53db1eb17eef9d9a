//! # Marbas
//!
//! *"The President who reveals hidden things"*
//!
//! Marbas turns images into text that can join a prompt: it decodes base64
//! payloads, then captions an image or answers a question about it through a
//! [`VisionModel`].
//!
//! Images are always passed explicitly. Nothing here keeps per-request state,
//! so one model instance can serve concurrent requests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod basic;
pub mod decode;
pub mod interpret;
pub mod model;
pub mod remote;

pub use basic::BasicVision;
pub use decode::{decode_base64, decode_bytes, encode_png_data_uri};
pub use interpret::interpret;
pub use model::{build_vision, VisionConfig, VisionKind, VisionModel};
pub use remote::RemoteVision;
