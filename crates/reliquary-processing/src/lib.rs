//! Reliquary Processing Library
//!
//! Rendition derivation for image-family media. The thumbnailer is
//! synchronous CPU work; callers run it through `spawn_blocking`.

pub mod thumbnail;

pub use thumbnail::{RenditionError, RenditionOutput, Thumbnailer};
