use crate::traits::{Vault, VaultError, VaultResult};
use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Local filesystem vault
///
/// All pipeline file I/O goes through here: staged uploads, rendition
/// writes, and the staging→durable moves that act as each promotion's
/// commit point.
#[derive(Clone, Default)]
pub struct LocalVault;

impl LocalVault {
    pub fn new() -> Self {
        LocalVault
    }

    async fn ensure_parent_dir(path: &Path) -> VaultResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Vault for LocalVault {
    async fn write(&self, path: &Path, data: &[u8]) -> VaultResult<()> {
        Self::ensure_parent_dir(path).await?;

        let mut file = fs::File::create(path).await.map_err(|e| {
            VaultError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(data).await.map_err(|e| {
            VaultError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            VaultError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), size_bytes = data.len(), "Vault write");
        Ok(())
    }

    async fn write_stream(
        &self,
        path: &Path,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> VaultResult<u64> {
        Self::ensure_parent_dir(path).await?;

        let mut file = fs::File::create(path).await.map_err(|e| {
            VaultError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            VaultError::WriteFailed(format!(
                "Failed to write stream to file {}: {}",
                path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            VaultError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), size_bytes = bytes_copied, "Vault stream write");
        Ok(bytes_copied)
    }

    async fn read(&self, path: &Path) -> VaultResult<Vec<u8>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(VaultError::NotFound(path.display().to_string()));
        }

        fs::read(path).await.map_err(|e| {
            VaultError::ReadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    async fn move_file(&self, from: &Path, to: &Path) -> VaultResult<()> {
        if !fs::try_exists(from).await.unwrap_or(false) {
            return Err(VaultError::NotFound(from.display().to_string()));
        }

        Self::ensure_parent_dir(to).await?;

        match fs::rename(from, to).await {
            Ok(()) => {}
            Err(rename_err) => {
                // EXDEV: staging and durable roots on different filesystems
                fs::copy(from, to).await.map_err(|e| {
                    VaultError::MoveFailed(format!(
                        "Failed to move {} to {}: rename: {}, copy: {}",
                        from.display(),
                        to.display(),
                        rename_err,
                        e
                    ))
                })?;
                fs::remove_file(from).await.map_err(|e| {
                    VaultError::MoveFailed(format!(
                        "Failed to remove source {} after copy: {}",
                        from.display(),
                        e
                    ))
                })?;
            }
        }

        tracing::debug!(from = %from.display(), to = %to.display(), "Vault move");
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> VaultResult<()> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(path).await.map_err(|e| {
            VaultError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), "Vault file removed");
        Ok(())
    }

    async fn remove_dir_all(&self, path: &Path) -> VaultResult<()> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_dir_all(path).await.map_err(|e| {
            VaultError::DeleteFailed(format!(
                "Failed to delete directory {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %path.display(), "Vault directory removed");
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}
