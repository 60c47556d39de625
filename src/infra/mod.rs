//! Infrastructure adapters and runtime bootstrap.

pub mod cache;
pub mod error;
pub mod http;
pub mod kv;
pub mod providers;
pub mod revalidate;
pub mod telemetry;
