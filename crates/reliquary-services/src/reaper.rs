//! Reaper - deletes a media asset's record and files together
//!
//! The record goes first, inside a transaction; the files follow. A failed
//! file removal is logged and reported for the sweep to retry, never
//! rolled back: the relational side is the source of truth, and a leftover
//! file is a disk-space issue where a record pointing at a removed file
//! would be a correctness bug.

use chrono::Utc;
use reliquary_core::{AppError, AssetState, MediaAsset};
use reliquary_db::AssetStore;
use reliquary_storage::{PathCodec, Vault};
use std::sync::Arc;
use uuid::Uuid;

pub struct Reaper {
    store: AssetStore,
    vault: Arc<dyn Vault>,
    codec: PathCodec,
}

/// Result of a cascading reap: how many records went, and which file
/// removals are still owed to the disk.
#[derive(Debug, Default)]
pub struct CascadeOutcome {
    pub reaped: usize,
    pub failed_files: Vec<String>,
}

impl Reaper {
    pub fn new(store: AssetStore, vault: Arc<dyn Vault>, codec: PathCodec) -> Self {
        Self {
            store,
            vault,
            codec,
        }
    }

    /// Delete one asset: record first, then its files. Returns the paths
    /// whose removal failed (empty on a clean reap).
    #[tracing::instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn reap(&self, asset_id: Uuid) -> Result<Vec<String>, AppError> {
        let mut tx = self.store.begin().await?;
        let removed = match self.store.delete(&mut tx, asset_id).await {
            Ok(row) => row,
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        };
        tx.commit().await?;

        let failed = self.remove_asset_files(&removed).await;
        tracing::info!(
            asset_id = %removed.id,
            state = ?removed.state,
            failed_files = failed.len(),
            "Media asset reaped"
        );
        Ok(failed)
    }

    /// Reap every asset bound to an owning entity. Assets are enumerated
    /// first and reaped independently, so one failure does not block the
    /// rest.
    #[tracing::instrument(skip(self), fields(binding = %binding))]
    pub async fn reap_cascade(&self, binding: Uuid) -> Result<CascadeOutcome, AppError> {
        let assets = self.store.find_synced(binding, None).await?;
        let mut outcome = CascadeOutcome::default();

        for asset in assets {
            match self.reap(asset.id).await {
                Ok(failed) => {
                    outcome.reaped += 1;
                    outcome.failed_files.extend(failed);
                }
                Err(AppError::NotFound(_)) => {
                    // reaped concurrently; the record is gone either way
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        asset_id = %asset.id,
                        "Failed to reap bound asset, continuing cascade"
                    );
                }
            }
        }

        tracing::info!(
            binding = %binding,
            reaped = outcome.reaped,
            failed_files = outcome.failed_files.len(),
            "Cascade reap completed"
        );
        Ok(outcome)
    }

    /// Reap STAGED assets that were never promoted within the retention
    /// window. Returns how many records were reclaimed.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_stale(&self, retention_hours: i64) -> Result<usize, AppError> {
        let cutoff = Utc::now() - chrono::Duration::hours(retention_hours);
        let stale = self.store.find_stale_staged(cutoff).await?;
        let mut reaped = 0;

        for asset in stale {
            match self.reap(asset.id).await {
                Ok(_) => reaped += 1,
                Err(AppError::NotFound(_)) => {}
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        asset_id = %asset.id,
                        "Failed to reap stale staged asset"
                    );
                }
            }
        }

        Ok(reaped)
    }

    /// Remove an asset's files from whichever tree it occupied. Failures
    /// are collected, not raised.
    async fn remove_asset_files(&self, asset: &MediaAsset) -> Vec<String> {
        let mut failed = Vec::new();

        let (dir, mut files) = match asset.state {
            AssetState::Synced => {
                let primary = self.codec.durable_path(asset);
                let mut files = Vec::new();
                if asset.kind.needs_rendition() {
                    files.push(self.codec.rendition_path(&primary));
                }
                files.push(primary);
                (self.codec.durable_dir(asset), files)
            }
            AssetState::Staged => (
                self.codec.staging_dir(asset),
                vec![self.codec.staging_path(asset)],
            ),
        };

        for path in files.drain(..) {
            if let Err(e) = self.vault.remove_file(&path).await {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "Failed to remove reaped asset file"
                );
                failed.push(path.display().to_string());
            }
        }

        if let Err(e) = self.vault.remove_dir_all(&dir).await {
            tracing::debug!(error = %e, dir = %dir.display(), "Failed to remove reaped asset directory");
        }

        failed
    }
}
