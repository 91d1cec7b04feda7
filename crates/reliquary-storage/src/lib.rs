//! Reliquary Storage Library
//!
//! Filesystem layer of the media pipeline: the deterministic mapping from
//! an asset's identity to its on-disk locations, identity generation for
//! new assets, and the local vault that performs the actual I/O.
//!
//! # Tree layout
//!
//! - **Staging**: `{staging_root}/{storage_dir}/{id}{extension}`
//! - **Durable**: `{durable_root}/{kind subtree}/{storage_dir}/{id}{extension}`
//! - **Rendition**: same directory as its primary, with a `_resized`
//!   suffix before the extension.
//!
//! `storage_dir` is a hex-encoded random digest, never derived from user
//! input, so durable paths are not guessable. Path derivation is
//! centralized in [`PathCodec`] so every component computes identical
//! locations for the same asset.

pub mod local;
pub mod naming;
pub mod paths;
pub mod traits;

// Re-export commonly used types
pub use local::LocalVault;
pub use naming::{new_asset_id, new_storage_dir};
pub use paths::PathCodec;
pub use traits::{Vault, VaultError, VaultResult};
