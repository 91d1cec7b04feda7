//! Reliquary Services Library
//!
//! The pipeline's moving parts: the Stager receives uploads into the
//! staging tree, the Synchronizer drives the STAGED→SYNCED state machine,
//! the Reaper deletes records and files together, and the sweep service
//! reclaims abandoned staged assets. `MediaPipeline` wires them up and is
//! the surface collaborators hold.

pub mod pipeline;
pub mod reaper;
pub mod stager;
pub mod sweep;
pub mod synchronizer;

pub use pipeline::MediaPipeline;
pub use reaper::{CascadeOutcome, Reaper};
pub use stager::Stager;
pub use sweep::SweepService;
pub use synchronizer::Synchronizer;
