//! Identity generation for newly staged assets.
//!
//! Both values are derived from fresh randomness, never from user input:
//! the asset id names the row, and the storage directory names the on-disk
//! partition. Keeping them independent means leaking one reveals nothing
//! about the other.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate the opaque stable identifier for a new asset.
pub fn new_asset_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate the high-entropy directory component a new asset files under.
///
/// Hex sha-256 of a fresh uuid: 64 lowercase hex characters, unique per
/// asset for any practical volume.
pub fn new_storage_dir() -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}
