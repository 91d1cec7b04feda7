//! Configuration module
//!
//! Environment-driven configuration for the media pipeline: the two
//! filesystem roots, the relational index, rendition parameters, and the
//! staged-asset retention window.

use std::env;
use std::path::PathBuf;

const DEFAULT_THUMBNAIL_WIDTH: u32 = 800;
const DEFAULT_THUMBNAIL_HEIGHT: u32 = 600;
const DEFAULT_THUMBNAIL_QUALITY: u8 = 85;
const DEFAULT_MAX_FILE_SIZE_MB: usize = 50;
const DEFAULT_STAGED_RETENTION_HOURS: i64 = 24;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Media pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Root of the temporary holding tree for unpromoted uploads
    pub staging_root: PathBuf,
    /// Root of the durable tree for promoted assets
    pub durable_root: PathBuf,
    /// SQLite database URL for the asset index
    pub database_url: String,
    /// Base URL under which the durable tree is served
    pub public_base_url: String,
    /// Rendition bounding box
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    /// JPEG re-encode quality for renditions (1-100)
    pub thumbnail_quality: u8,
    /// Maximum accepted upload size
    pub max_file_size_bytes: usize,
    /// Accepted upload extensions (with leading dot); empty = accept all
    pub allowed_extensions: Vec<String>,
    /// Hours a STAGED asset may linger before the sweep reclaims it
    pub staged_retention_hours: i64,
    /// Interval between background sweep passes
    pub sweep_interval_secs: u64,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let staging_root = env::var("MEDIA_STAGING_ROOT")
            .unwrap_or_else(|_| "var/media/temporary".to_string())
            .into();
        let durable_root = env::var("MEDIA_DURABLE_ROOT")
            .unwrap_or_else(|_| "var/media/synced".to_string())
            .into();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://var/media/index.db".to_string());

        let public_base_url = env::var("MEDIA_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000/media".to_string());

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_MB);

        let allowed_extensions = env::var("ALLOWED_EXTENSIONS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .map(|s| if s.starts_with('.') { s } else { format!(".{}", s) })
                    .collect()
            })
            .unwrap_or_default();

        Ok(PipelineConfig {
            staging_root,
            durable_root,
            database_url,
            public_base_url,
            thumbnail_width: env::var("THUMBNAIL_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_THUMBNAIL_WIDTH),
            thumbnail_height: env::var("THUMBNAIL_HEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_THUMBNAIL_HEIGHT),
            thumbnail_quality: env::var("THUMBNAIL_QUALITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_THUMBNAIL_QUALITY),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_extensions,
            staged_retention_hours: env::var("STAGED_RETENTION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_STAGED_RETENTION_HOURS),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.staging_root == self.durable_root {
            anyhow::bail!("MEDIA_STAGING_ROOT and MEDIA_DURABLE_ROOT must differ");
        }
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            anyhow::bail!("thumbnail bounding box must be non-zero");
        }
        if self.thumbnail_quality == 0 || self.thumbnail_quality > 100 {
            anyhow::bail!("THUMBNAIL_QUALITY must be within 1-100");
        }
        if self.max_file_size_bytes == 0 {
            anyhow::bail!("MAX_FILE_SIZE_MB must be non-zero");
        }
        if self.staged_retention_hours <= 0 {
            anyhow::bail!("STAGED_RETENTION_HOURS must be positive");
        }
        Ok(())
    }
}
