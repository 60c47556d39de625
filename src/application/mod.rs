//! Application services: aggregation, the update job and its triggers.

pub mod aggregator;
pub mod error;
pub mod invalidation;
pub mod jobs;
pub mod profile_job;
pub mod trigger;
