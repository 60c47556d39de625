//! Shared read-model and response types for the folio daily profile service.
//!
//! Readers (page widgets, the CLI, external tooling) depend on this crate to
//! decode what the profile job persists and what its HTTP surface returns,
//! without pulling in the server.

mod profile;
mod responses;

pub use profile::{
    Article, ArticleFeed, HumidityBand, MusicActivity, Profile, Snapshot, Track, Weather,
};
pub use responses::{FailureResponse, UpdateProfileResponse};
