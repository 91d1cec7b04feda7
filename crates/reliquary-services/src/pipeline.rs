//! Pipeline facade
//!
//! Wires the vault, path codec, asset store, and thumbnailer into one
//! surface collaborators hold: stage, promote, replace, detach, list,
//! cascade-reap, sweep.

use crate::{Reaper, Stager, SweepService, Synchronizer};
use reliquary_core::{AppError, AssetView, MediaAsset, MediaKind, PipelineConfig};
use reliquary_db::AssetStore;
use reliquary_processing::Thumbnailer;
use reliquary_storage::{LocalVault, PathCodec, Vault};
use sqlx::SqlitePool;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

pub struct MediaPipeline {
    stager: Stager,
    synchronizer: Synchronizer,
    reaper: Arc<Reaper>,
    config: PipelineConfig,
}

impl MediaPipeline {
    /// Validate the configuration, open the asset index, and assemble the
    /// pipeline.
    pub async fn from_config(config: PipelineConfig) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let pool = reliquary_db::connect(&config.database_url).await?;
        Ok(Self::new(config, pool))
    }

    pub fn new(config: PipelineConfig, pool: SqlitePool) -> Self {
        let store = AssetStore::new(pool);
        let vault: Arc<dyn Vault> = Arc::new(LocalVault::new());
        let codec = PathCodec::from_config(&config);
        let thumbnailer = Thumbnailer::new(
            config.thumbnail_width,
            config.thumbnail_height,
            config.thumbnail_quality,
        );

        let stager = Stager::new(store.clone(), vault.clone(), codec.clone(), &config);
        let synchronizer =
            Synchronizer::new(store.clone(), vault.clone(), codec.clone(), thumbnailer);
        let reaper = Arc::new(Reaper::new(store, vault, codec));

        Self {
            stager,
            synchronizer,
            reaper,
            config,
        }
    }

    /// Receive an upload into the staging tree
    pub async fn stage(
        &self,
        owner_ref: Option<Uuid>,
        kind: MediaKind,
        group_tag: &str,
        original_filename: &str,
        data: Vec<u8>,
    ) -> Result<MediaAsset, AppError> {
        self.stager
            .stage(owner_ref, kind, group_tag, original_filename, data)
            .await
    }

    /// Receive a streamed upload into the staging tree
    pub async fn stage_stream(
        &self,
        owner_ref: Option<Uuid>,
        kind: MediaKind,
        group_tag: &str,
        original_filename: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> Result<MediaAsset, AppError> {
        self.stager
            .stage_stream(owner_ref, kind, group_tag, original_filename, reader)
            .await
    }

    /// Bind one staged asset to an owning entity and move it durable
    pub async fn promote(&self, asset_id: Uuid, binding: Uuid) -> Result<MediaAsset, AppError> {
        self.synchronizer.promote(asset_id, binding).await
    }

    /// Promote a whole upload batch
    pub async fn promote_group(
        &self,
        group_tag: &str,
        kind: MediaKind,
        binding: Uuid,
    ) -> Result<Vec<MediaAsset>, AppError> {
        self.synchronizer
            .promote_group(group_tag, kind, binding)
            .await
    }

    /// Swap a synced asset's content for a newly staged upload
    pub async fn replace(
        &self,
        existing_id: Uuid,
        incoming_id: Uuid,
    ) -> Result<MediaAsset, AppError> {
        self.synchronizer.replace(existing_id, incoming_id).await
    }

    /// Remove one asset, files and record together (delegates to the
    /// Reaper)
    pub async fn detach(&self, asset_id: Uuid) -> Result<(), AppError> {
        self.reaper.reap(asset_id).await.map(|_| ())
    }

    /// Synced assets of an owning entity, with public URLs
    pub async fn list_synced(&self, binding: Uuid) -> Result<Vec<AssetView>, AppError> {
        self.synchronizer.list_synced(binding).await
    }

    /// Remove every asset bound to an owning entity
    pub async fn reap_cascade(
        &self,
        binding: Uuid,
    ) -> Result<crate::CascadeOutcome, AppError> {
        self.reaper.reap_cascade(binding).await
    }

    /// Run one sweep pass over stale staged assets
    pub async fn sweep_stale(&self) -> Result<usize, AppError> {
        self.reaper
            .sweep_stale(self.config.staged_retention_hours)
            .await
    }

    /// Start the periodic background sweep
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let service = Arc::new(SweepService::new(
            self.reaper.clone(),
            self.config.staged_retention_hours,
            self.config.sweep_interval_secs,
        ));
        service.start()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
