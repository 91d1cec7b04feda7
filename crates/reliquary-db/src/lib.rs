//! Reliquary DB Library
//!
//! The relational index of media assets: pool setup, embedded migrations,
//! and the `AssetStore` repository. Every state transition is a
//! conditional write so concurrent attempts on the same asset are rejected
//! rather than silently reapplied.

pub mod pool;
pub mod store;

pub use pool::connect;
pub use store::AssetStore;
