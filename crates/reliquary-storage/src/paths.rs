//! Deterministic mapping between an asset's identity and its on-disk
//! locations. Pure derivation, no I/O: given the same asset fields the
//! same paths come back, which is what makes retries safe.

use reliquary_core::{MediaAsset, PipelineConfig};
use std::path::{Path, PathBuf};

/// Suffix inserted before the extension to name the resized companion of
/// a primary file.
pub const RENDITION_SUFFIX: &str = "_resized";

#[derive(Clone, Debug)]
pub struct PathCodec {
    staging_root: PathBuf,
    durable_root: PathBuf,
    public_base_url: String,
}

impl PathCodec {
    pub fn new(
        staging_root: impl Into<PathBuf>,
        durable_root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let public_base_url: String = public_base_url.into();
        PathCodec {
            staging_root: staging_root.into(),
            durable_root: durable_root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            &config.staging_root,
            &config.durable_root,
            &config.public_base_url,
        )
    }

    /// Directory an asset's staging file lives in
    pub fn staging_dir(&self, asset: &MediaAsset) -> PathBuf {
        self.staging_root.join(&asset.storage_dir)
    }

    /// Full path of an asset's staging file
    pub fn staging_path(&self, asset: &MediaAsset) -> PathBuf {
        self.staging_dir(asset).join(asset.file_name())
    }

    /// Directory an asset's durable files live in
    pub fn durable_dir(&self, asset: &MediaAsset) -> PathBuf {
        self.durable_root
            .join(asset.kind.subtree())
            .join(&asset.storage_dir)
    }

    /// Full path of an asset's durable primary file
    pub fn durable_path(&self, asset: &MediaAsset) -> PathBuf {
        self.durable_dir(asset).join(asset.file_name())
    }

    /// Durable primary path with an extension other than the recorded one.
    /// Used while a promotion or replacement is correcting the extension.
    pub fn durable_path_with_extension(&self, asset: &MediaAsset, extension: &str) -> PathBuf {
        self.durable_dir(asset)
            .join(format!("{}{}", asset.id, extension))
    }

    /// Staging primary path with an explicit extension
    pub fn staging_path_with_extension(&self, asset: &MediaAsset, extension: &str) -> PathBuf {
        self.staging_dir(asset)
            .join(format!("{}{}", asset.id, extension))
    }

    /// Path of the resized companion of `path`: the `_resized` marker goes
    /// between the file stem and the extension.
    pub fn rendition_path(&self, path: &Path) -> PathBuf {
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match path.extension() {
            Some(ext) => parent.join(format!(
                "{}{}.{}",
                stem,
                RENDITION_SUFFIX,
                ext.to_string_lossy()
            )),
            None => parent.join(format!("{}{}", stem, RENDITION_SUFFIX)),
        }
    }

    /// Public URL of an asset's durable primary file
    pub fn primary_url(&self, asset: &MediaAsset) -> String {
        format!(
            "{}/{}/{}/{}",
            self.public_base_url,
            asset.kind.subtree(),
            asset.storage_dir,
            asset.file_name()
        )
    }

    /// Public URL of an asset's rendition, for kinds that carry one
    pub fn rendition_url(&self, asset: &MediaAsset) -> Option<String> {
        if !asset.kind.needs_rendition() {
            return None;
        }
        Some(format!(
            "{}/{}/{}/{}{}{}",
            self.public_base_url,
            asset.kind.subtree(),
            asset.storage_dir,
            asset.id,
            RENDITION_SUFFIX,
            asset.extension
        ))
    }
}
