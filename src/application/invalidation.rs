use serde::Serialize;
use tracing::info;

use crate::infra::{cache::ResponseCache, revalidate::RevalidateClient};

/// What a post-write invalidation pass managed to clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    pub cached_responses: usize,
    pub revalidated_paths: usize,
    pub attempted_paths: usize,
}

/// Clears every cache that may still serve the previous snapshot.
///
/// Best-effort: failures are logged by the targets and never fail the job.
#[derive(Clone, Default)]
pub struct PageInvalidator {
    response_cache: Option<ResponseCache>,
    revalidate: Option<RevalidateClient>,
}

impl PageInvalidator {
    pub fn new(response_cache: Option<ResponseCache>, revalidate: Option<RevalidateClient>) -> Self {
        Self {
            response_cache,
            revalidate,
        }
    }

    pub async fn invalidate(&self) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        if let Some(cache) = &self.response_cache {
            report.cached_responses = cache.invalidate_all().await;
        }

        if let Some(client) = &self.revalidate {
            report.attempted_paths = client.paths().len();
            report.revalidated_paths = client.revalidate_all().await;
        }

        info!(
            target = "folio::job",
            cached_responses = report.cached_responses,
            revalidated = report.revalidated_paths,
            attempted = report.attempted_paths,
            "Page caches invalidated"
        );
        report
    }
}
