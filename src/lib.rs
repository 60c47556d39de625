//! folio: daily profile aggregation for a personal portfolio site.
//!
//! A scheduled job gathers weather, recent reading and recent listening,
//! synthesizes a one-sentence blurb, and persists both in a key-value store
//! with a TTL. Every upstream call is bounded and falls back to the last
//! persisted value, so a run always produces a complete profile.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
