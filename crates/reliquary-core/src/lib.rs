//! Reliquary Core Library
//!
//! Shared domain models, error types, and configuration for the media
//! staging-and-synchronization pipeline.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{AppError, LogLevel};
pub use models::{AssetState, AssetView, MediaAsset, MediaKind};
