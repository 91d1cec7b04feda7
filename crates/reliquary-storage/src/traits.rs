//! Vault abstraction trait
//!
//! The vault owns raw file operations under the media roots. Paths are
//! always produced by [`crate::PathCodec`]; the vault never derives
//! locations on its own.

use async_trait::async_trait;
use reliquary_core::AppError;
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Vault operation errors
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Move failed: {0}")]
    MoveFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

impl From<VaultError> for AppError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::MoveFailed(msg) => AppError::StorageMove(msg),
            VaultError::NotFound(msg) => AppError::NotFound(msg),
            VaultError::WriteFailed(msg)
            | VaultError::ReadFailed(msg)
            | VaultError::DeleteFailed(msg) => AppError::StorageWrite(msg),
            VaultError::Io(err) => AppError::StorageWrite(err.to_string()),
        }
    }
}

/// Filesystem operations the pipeline needs from its media tree.
///
/// A single local tree is the only backing today; the trait is the seam the
/// services hold (`Arc<dyn Vault>`) so the pipeline stays decoupled from
/// the concrete filesystem layer.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Write a whole buffer to `path`, creating parent directories
    async fn write(&self, path: &Path, data: &[u8]) -> VaultResult<()>;

    /// Write a stream to `path`, creating parent directories; returns the
    /// number of bytes written
    async fn write_stream(
        &self,
        path: &Path,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> VaultResult<u64>;

    /// Read a whole file
    async fn read(&self, path: &Path) -> VaultResult<Vec<u8>>;

    /// Move a file, creating the destination's parents. A rename when
    /// source and destination share a filesystem, copy-then-remove when
    /// they do not.
    async fn move_file(&self, from: &Path, to: &Path) -> VaultResult<()>;

    /// Remove a file; absent files are not an error
    async fn remove_file(&self, path: &Path) -> VaultResult<()>;

    /// Remove a directory tree; absent directories are not an error
    async fn remove_dir_all(&self, path: &Path) -> VaultResult<()>;

    /// Check whether a file exists
    async fn exists(&self, path: &Path) -> bool;
}
