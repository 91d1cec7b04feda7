//! Data models for the pipeline
//!
//! One sub-module per feature area; media assets are the only entity this
//! pipeline owns (owning entities and accounts are opaque references).

mod asset;

pub use asset::*;
