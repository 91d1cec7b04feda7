use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Purpose tag of a media asset. Drives which post-processing applies and
/// where the asset files under the durable tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    ProfilePicture,
    GalleryPhoto,
    GalleryVideo,
    SupportingDocument,
    ConservationPhoto,
}

impl MediaKind {
    /// Image-family kinds gain a resized rendition at promotion time;
    /// video and document kinds are served from the primary file alone.
    pub fn needs_rendition(&self) -> bool {
        matches!(
            self,
            MediaKind::ProfilePicture | MediaKind::GalleryPhoto | MediaKind::ConservationPhoto
        )
    }

    /// Subtree under the durable root this kind files into
    pub fn subtree(&self) -> &'static str {
        match self {
            MediaKind::ProfilePicture => "profile",
            MediaKind::GalleryPhoto => "photos",
            MediaKind::GalleryVideo => "videos",
            MediaKind::SupportingDocument => "documents",
            MediaKind::ConservationPhoto => "conservation",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::ProfilePicture => "profile-picture",
            MediaKind::GalleryPhoto => "gallery-photo",
            MediaKind::GalleryVideo => "gallery-video",
            MediaKind::SupportingDocument => "supporting-document",
            MediaKind::ConservationPhoto => "conservation-photo",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile-picture" => Ok(MediaKind::ProfilePicture),
            "gallery-photo" => Ok(MediaKind::GalleryPhoto),
            "gallery-video" => Ok(MediaKind::GalleryVideo),
            "supporting-document" => Ok(MediaKind::SupportingDocument),
            "conservation-photo" => Ok(MediaKind::ConservationPhoto),
            other => Err(format!("unknown media kind: {}", other)),
        }
    }
}

/// Lifecycle state of a media asset. Deletion is terminal and removes the
/// row, so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    Staged,
    Synced,
}

/// A media asset row: the relational half of the staging/durable contract.
///
/// `storage_dir` is assigned exactly once at staging time from a
/// high-entropy random value and never recomputed, so the on-disk location
/// stays stable for the asset's whole life. `extension` is provisional
/// until promotion, when the sniffed content format may correct it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct MediaAsset {
    pub id: Uuid,
    pub owner_ref: Option<Uuid>,
    pub binding: Option<Uuid>,
    pub group_tag: String,
    pub kind: MediaKind,
    pub storage_dir: String,
    pub extension: String,
    pub state: AssetState,
    pub staged_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl MediaAsset {
    /// Primary file name under the asset's directory
    pub fn file_name(&self) -> String {
        format!("{}{}", self.id, self.extension)
    }

    pub fn is_staged(&self) -> bool {
        self.state == AssetState::Staged
    }

    pub fn is_synced(&self) -> bool {
        self.state == AssetState::Synced
    }
}

/// Read-model of a synced asset handed to collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetView {
    pub id: Uuid,
    pub kind: MediaKind,
    pub primary_url: String,
    pub rendition_url: Option<String>,
}
