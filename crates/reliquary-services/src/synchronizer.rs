//! Synchronizer - the STAGED→SYNCED state machine driver
//!
//! Every transition runs claim-first: the transaction opens with the
//! conditional row update, filesystem work happens inside the window, and
//! a failure rolls the claim back and restores any file already moved. The
//! staging→durable rename is the commit point on the filesystem side;
//! renditions are derived next to the staged primary before anything
//! moves, so a file that cannot be processed never reaches the durable
//! tree.

use chrono::Utc;
use reliquary_core::{AppError, AssetView, MediaAsset, MediaKind};
use reliquary_db::AssetStore;
use reliquary_processing::Thumbnailer;
use reliquary_storage::{PathCodec, Vault};
use sqlx::{Sqlite, Transaction};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub struct Synchronizer {
    store: AssetStore,
    vault: Arc<dyn Vault>,
    codec: PathCodec,
    thumbnailer: Thumbnailer,
}

/// Files landed in the durable tree for one asset, with enough
/// information to put them back if the enclosing transaction dies.
struct LandedFiles {
    asset: MediaAsset,
    /// (durable, staging) pairs, in landing order
    moved: Vec<(PathBuf, PathBuf)>,
    staging_dir: PathBuf,
}

impl Synchronizer {
    pub fn new(
        store: AssetStore,
        vault: Arc<dyn Vault>,
        codec: PathCodec,
        thumbnailer: Thumbnailer,
    ) -> Self {
        Self {
            store,
            vault,
            codec,
            thumbnailer,
        }
    }

    /// Promote one staged asset: bind it to its owning entity and move its
    /// files into the durable tree.
    ///
    /// A second promotion of the same asset returns `Conflict`, which
    /// callers treat as "nothing to do" (double-submitted forms are the
    /// common trigger).
    #[tracing::instrument(skip(self), fields(asset_id = %asset_id, binding = %binding))]
    pub async fn promote(&self, asset_id: Uuid, binding: Uuid) -> Result<MediaAsset, AppError> {
        let mut tx = self.store.begin().await?;

        let claimed = match self
            .store
            .claim_synced(&mut tx, asset_id, binding, Utc::now())
            .await
        {
            Ok(row) => row,
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        };

        let landed = match self.land_staged_files(&mut tx, &claimed).await {
            Ok(landed) => landed,
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            self.restore_moves(&landed.moved).await;
            return Err(AppError::Database(e));
        }

        self.cleanup_staging_dir(&landed.staging_dir).await;

        tracing::info!(
            asset_id = %landed.asset.id,
            binding = %binding,
            kind = %landed.asset.kind,
            "Media asset promoted"
        );
        Ok(landed.asset)
    }

    /// Promote every staged asset of an upload batch in one transaction.
    ///
    /// Rows claimed by a concurrent request are skipped (benign). Rows
    /// whose staging file has gone missing are skipped with a warning and
    /// age out via the sweep. A processing or filesystem failure aborts
    /// the whole batch.
    #[tracing::instrument(skip(self), fields(kind = %kind, binding = %binding))]
    pub async fn promote_group(
        &self,
        group_tag: &str,
        kind: MediaKind,
        binding: Uuid,
    ) -> Result<Vec<MediaAsset>, AppError> {
        let staged = self.store.find_staged(group_tag, kind).await?;
        if staged.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.store.begin().await?;
        let mut promoted = Vec::new();
        let mut all_moved: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut cleanup_dirs = Vec::new();

        for asset in &staged {
            if !self.vault.exists(&self.codec.staging_path(asset)).await {
                tracing::warn!(
                    asset_id = %asset.id,
                    "Staged file missing, skipping promotion"
                );
                continue;
            }

            let claimed = match self
                .store
                .claim_synced(&mut tx, asset.id, binding, Utc::now())
                .await
            {
                Ok(row) => row,
                Err(AppError::Conflict(_)) | Err(AppError::NotFound(_)) => {
                    tracing::debug!(asset_id = %asset.id, "Asset claimed concurrently, skipping");
                    continue;
                }
                Err(e) => {
                    let _ = tx.rollback().await;
                    self.restore_moves(&all_moved).await;
                    return Err(e);
                }
            };

            match self.land_staged_files(&mut tx, &claimed).await {
                Ok(landed) => {
                    promoted.push(landed.asset);
                    all_moved.extend(landed.moved);
                    cleanup_dirs.push(landed.staging_dir);
                }
                Err(e) => {
                    let _ = tx.rollback().await;
                    self.restore_moves(&all_moved).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = tx.commit().await {
            self.restore_moves(&all_moved).await;
            return Err(AppError::Database(e));
        }

        for dir in &cleanup_dirs {
            self.cleanup_staging_dir(dir).await;
        }

        tracing::info!(
            group_tag,
            binding = %binding,
            promoted = promoted.len(),
            "Media batch promoted"
        );
        Ok(promoted)
    }

    /// Swap a SYNCED asset's content for a newly staged upload. The asset
    /// keeps its id and storage directory; the staged record is consumed.
    ///
    /// New files land before old files are removed, so an interrupted
    /// replacement leaves the previous durable content servable, never a
    /// gap where neither version exists.
    #[tracing::instrument(skip(self), fields(existing_id = %existing_id, incoming_id = %incoming_id))]
    pub async fn replace(
        &self,
        existing_id: Uuid,
        incoming_id: Uuid,
    ) -> Result<MediaAsset, AppError> {
        let mut tx = self.store.begin().await?;

        // claim the incoming row first; the conditional delete rejects an
        // upload that was promoted or consumed concurrently
        let incoming = match self.store.consume_staged(&mut tx, incoming_id).await {
            Ok(row) => row,
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        };

        let existing = match self.store.get_synced(&mut tx, existing_id).await {
            Ok(row) => row,
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        };

        match self
            .land_replacement_files(&mut tx, &existing, &incoming)
            .await
        {
            Ok((updated, old_files)) => {
                if let Err(e) = tx.commit().await {
                    return Err(AppError::Database(e));
                }

                // old durable files go only after the new ones are in
                // place and confirmed; leftovers are disk garbage, not a
                // correctness problem
                for path in &old_files {
                    if let Err(cleanup) = self.vault.remove_file(path).await {
                        tracing::warn!(
                            error = %cleanup,
                            path = %path.display(),
                            "Failed to remove superseded durable file"
                        );
                    }
                }
                self.cleanup_staging_dir(&self.codec.staging_dir(&incoming)).await;

                tracing::info!(
                    asset_id = %updated.id,
                    consumed = %incoming.id,
                    "Media asset content replaced"
                );
                Ok(updated)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Synced assets of an owning entity as the read-model collaborators
    /// consume: ids plus public URLs.
    pub async fn list_synced(&self, binding: Uuid) -> Result<Vec<AssetView>, AppError> {
        let assets = self.store.find_synced(binding, None).await?;
        Ok(assets
            .iter()
            .map(|asset| AssetView {
                id: asset.id,
                kind: asset.kind,
                primary_url: self.codec.primary_url(asset),
                rendition_url: self.codec.rendition_url(asset),
            })
            .collect())
    }

    /// Derive the rendition next to the staged primary, then move primary
    /// and rendition into the durable tree. Returns with the staging tree
    /// restored on any failure.
    async fn land_staged_files(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        claimed: &MediaAsset,
    ) -> Result<LandedFiles, AppError> {
        let staging_primary = self.codec.staging_path(claimed);
        if !self.vault.exists(&staging_primary).await {
            return Err(AppError::StorageMove(format!(
                "staged file missing for media asset {}",
                claimed.id
            )));
        }

        let mut final_asset = claimed.clone();
        let mut staging_rendition = None;

        if claimed.kind.needs_rendition() {
            let output = self.render(&staging_primary).await?;

            if !output.detected_extension.is_empty()
                && output.detected_extension != claimed.extension
            {
                tracing::debug!(
                    asset_id = %claimed.id,
                    declared = %claimed.extension,
                    detected = %output.detected_extension,
                    "Correcting extension from sniffed content format"
                );
                self.store
                    .update_extension(tx, claimed.id, &output.detected_extension)
                    .await?;
                final_asset.extension = output.detected_extension.clone();
            }

            let rendition_path = self
                .codec
                .rendition_path(&self.codec.staging_path(&final_asset));
            self.vault.write(&rendition_path, &output.data).await?;
            staging_rendition = Some(rendition_path);
        }

        let durable_primary = self.codec.durable_path(&final_asset);
        let mut moved = Vec::new();

        if let Err(e) = self.vault.move_file(&staging_primary, &durable_primary).await {
            self.discard_rendition(staging_rendition.as_deref()).await;
            return Err(e.into());
        }
        moved.push((durable_primary.clone(), staging_primary));

        if let Some(rendition) = &staging_rendition {
            let durable_rendition = self.codec.rendition_path(&durable_primary);
            if let Err(e) = self.vault.move_file(rendition, &durable_rendition).await {
                self.restore_moves(&moved).await;
                return Err(e.into());
            }
            moved.push((durable_rendition, rendition.clone()));
        }

        Ok(LandedFiles {
            staging_dir: self.codec.staging_dir(&final_asset),
            asset: final_asset,
            moved,
        })
    }

    /// Land the incoming upload's files onto the existing asset's durable
    /// paths (same id, same directory, incoming extension), confirm the
    /// surviving row, and report which old files are now superseded.
    async fn land_replacement_files(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        existing: &MediaAsset,
        incoming: &MediaAsset,
    ) -> Result<(MediaAsset, Vec<PathBuf>), AppError> {
        let staging_primary = self.codec.staging_path(incoming);
        if !self.vault.exists(&staging_primary).await {
            return Err(AppError::StorageMove(format!(
                "staged file missing for media asset {}",
                incoming.id
            )));
        }

        let mut new_ext = incoming.extension.clone();
        let mut staging_rendition = None;

        if existing.kind.needs_rendition() {
            let output = self.render(&staging_primary).await?;
            if !output.detected_extension.is_empty() {
                new_ext = output.detected_extension.clone();
            }

            // named for the surviving asset so the move below is a rename
            let rendition_path = self.codec.rendition_path(
                &self
                    .codec
                    .staging_path_with_extension(incoming, &new_ext),
            );
            self.vault.write(&rendition_path, &output.data).await?;
            staging_rendition = Some(rendition_path);
        }

        let durable_primary = self.codec.durable_path_with_extension(existing, &new_ext);

        if let Err(e) = self.vault.move_file(&staging_primary, &durable_primary).await {
            self.discard_rendition(staging_rendition.as_deref()).await;
            return Err(e.into());
        }

        if let Some(rendition) = &staging_rendition {
            let durable_rendition = self.codec.rendition_path(&durable_primary);
            if let Err(e) = self.vault.move_file(rendition, &durable_rendition).await {
                return Err(e.into());
            }
        }

        let updated = self
            .store
            .confirm_replacement(tx, existing.id, &new_ext, Utc::now())
            .await?;

        // with an unchanged extension the moves above already overwrote
        // the old files in place
        let mut old_files = Vec::new();
        if new_ext != existing.extension {
            let old_primary = self.codec.durable_path(existing);
            if existing.kind.needs_rendition() {
                old_files.push(self.codec.rendition_path(&old_primary));
            }
            old_files.push(old_primary);
        }

        Ok((updated, old_files))
    }

    async fn render(
        &self,
        staging_primary: &std::path::Path,
    ) -> Result<reliquary_processing::RenditionOutput, AppError> {
        let bytes = self.vault.read(staging_primary).await?;
        let thumbnailer = self.thumbnailer;
        let output = tokio::task::spawn_blocking(move || thumbnailer.render(&bytes))
            .await
            .map_err(|e| AppError::Internal(format!("rendition task failed: {}", e)))??;
        Ok(output)
    }

    /// Put durable files back where they came from, newest first
    async fn restore_moves(&self, moved: &[(PathBuf, PathBuf)]) {
        for (durable, staging) in moved.iter().rev() {
            if let Err(e) = self.vault.move_file(durable, staging).await {
                tracing::error!(
                    error = %e,
                    durable = %durable.display(),
                    staging = %staging.display(),
                    "Failed to restore file after aborted transition"
                );
            }
        }
    }

    async fn discard_rendition(&self, rendition: Option<&std::path::Path>) {
        if let Some(path) = rendition {
            if let Err(e) = self.vault.remove_file(path).await {
                tracing::debug!(error = %e, path = %path.display(), "Failed to remove derived rendition");
            }
        }
    }

    /// Removing an emptied staging directory is cosmetic and never fails
    /// the operation that emptied it.
    async fn cleanup_staging_dir(&self, dir: &std::path::Path) {
        if let Err(e) = self.vault.remove_dir_all(dir).await {
            tracing::debug!(error = %e, dir = %dir.display(), "Staging directory cleanup failed");
        }
    }
}
