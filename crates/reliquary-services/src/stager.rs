//! Stager - receives inbound uploads into the staging tree
//!
//! Ordering contract: the staging file is written before the STAGED row is
//! inserted. A crash between the two leaves an unreferenced temp file for
//! the sweep, never a row pointing at a missing file.

use chrono::Utc;
use reliquary_core::{AppError, AssetState, MediaAsset, MediaKind, PipelineConfig};
use reliquary_db::AssetStore;
use reliquary_storage::{naming, PathCodec, Vault};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

pub struct Stager {
    store: AssetStore,
    vault: Arc<dyn Vault>,
    codec: PathCodec,
    max_file_size_bytes: usize,
    allowed_extensions: Vec<String>,
}

impl Stager {
    pub fn new(
        store: AssetStore,
        vault: Arc<dyn Vault>,
        codec: PathCodec,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            vault,
            codec,
            max_file_size_bytes: config.max_file_size_bytes,
            allowed_extensions: config.allowed_extensions.clone(),
        }
    }

    /// Stage an upload held in memory.
    #[tracing::instrument(skip(self, data), fields(kind = %kind))]
    pub async fn stage(
        &self,
        owner_ref: Option<Uuid>,
        kind: MediaKind,
        group_tag: &str,
        original_filename: &str,
        data: Vec<u8>,
    ) -> Result<MediaAsset, AppError> {
        if data.len() > self.max_file_size_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds the {} byte limit",
                data.len(),
                self.max_file_size_bytes
            )));
        }

        let asset = self.new_staged_asset(owner_ref, kind, group_tag, original_filename)?;
        let path = self.codec.staging_path(&asset);

        self.vault.write(&path, &data).await?;

        self.record_staged(asset, &path).await
    }

    /// Stage an upload from a stream. The size ceiling is enforced after
    /// the write; an oversized stream is deleted before any row exists.
    #[tracing::instrument(skip(self, reader), fields(kind = %kind))]
    pub async fn stage_stream(
        &self,
        owner_ref: Option<Uuid>,
        kind: MediaKind,
        group_tag: &str,
        original_filename: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> Result<MediaAsset, AppError> {
        let asset = self.new_staged_asset(owner_ref, kind, group_tag, original_filename)?;
        let path = self.codec.staging_path(&asset);

        let written = self.vault.write_stream(&path, reader).await?;
        if written > self.max_file_size_bytes as u64 {
            self.discard_staging_file(&asset, &path).await;
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds the {} byte limit",
                written, self.max_file_size_bytes
            )));
        }

        self.record_staged(asset, &path).await
    }

    fn new_staged_asset(
        &self,
        owner_ref: Option<Uuid>,
        kind: MediaKind,
        group_tag: &str,
        original_filename: &str,
    ) -> Result<MediaAsset, AppError> {
        let extension = extension_of(original_filename);
        if !self.allowed_extensions.is_empty() && !self.allowed_extensions.contains(&extension) {
            return Err(AppError::InvalidInput(format!(
                "file extension '{}' is not accepted",
                extension
            )));
        }

        Ok(MediaAsset {
            id: naming::new_asset_id(),
            owner_ref,
            binding: None,
            group_tag: group_tag.to_string(),
            kind,
            storage_dir: naming::new_storage_dir(),
            extension,
            state: AssetState::Staged,
            staged_at: Utc::now(),
            synced_at: None,
        })
    }

    async fn record_staged(&self, asset: MediaAsset, path: &Path) -> Result<MediaAsset, AppError> {
        match self.store.insert(&asset).await {
            Ok(row) => {
                tracing::info!(
                    asset_id = %row.id,
                    kind = %row.kind,
                    group_tag = %row.group_tag,
                    path = %path.display(),
                    "Media asset staged"
                );
                Ok(row)
            }
            Err(e) => {
                self.discard_staging_file(&asset, path).await;
                Err(e)
            }
        }
    }

    async fn discard_staging_file(&self, asset: &MediaAsset, path: &Path) {
        if let Err(cleanup) = self.vault.remove_file(path).await {
            tracing::warn!(
                error = %cleanup,
                path = %path.display(),
                "Failed to remove orphaned staging file"
            );
            return;
        }
        if let Err(cleanup) = self
            .vault
            .remove_dir_all(&self.codec.staging_dir(asset))
            .await
        {
            tracing::debug!(error = %cleanup, "Failed to remove staging directory");
        }
    }
}

/// Provisional extension from the declared filename: lowercased, with the
/// dot, empty when the name has none. The sniffed content format may
/// correct it at promotion time.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.JPG"), ".jpg");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("no_extension"), "");
        assert_eq!(extension_of("trailing."), "");
    }
}
