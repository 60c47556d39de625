//! HTTP surface: the update trigger, the public snapshot and debug routes.

mod cron;
mod debug;
mod middleware;
mod public;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    routing::get,
};

use crate::{
    application::{profile_job::ProfileJob, trigger::TriggerGuard},
    config::AppEnvironment,
    infra::{
        cache::{ResponseCache, cache_responses},
        kv::{KvStore, MemoryKv},
        providers::{FeedlyClient, OpenMeteoClient},
    },
};

pub use middleware::RequestContext;

use middleware::{log_responses, set_request_context};

/// Concrete provider clients the debug routes call directly.
#[derive(Clone)]
pub struct DebugSources {
    pub weather: Arc<OpenMeteoClient>,
    pub feed: Arc<FeedlyClient>,
}

#[derive(Clone)]
pub struct HttpState {
    pub job: Arc<ProfileJob>,
    pub guard: TriggerGuard,
    pub kv: Arc<dyn KvStore>,
    /// Present only when the in-memory store backs `kv`.
    pub memory: Option<Arc<MemoryKv>>,
    pub response_cache: ResponseCache,
    pub environment: AppEnvironment,
    pub debug: Option<DebugSources>,
}

pub fn build_router(state: HttpState) -> Router {
    let cached_routes = Router::new()
        .route("/api/profile", get(public::profile))
        .layer(axum_middleware::from_fn_with_state(
            state.response_cache.clone(),
            cache_responses,
        ));

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/cron/update-profile",
            get(cron::reject_get).post(cron::update_profile),
        )
        .nest("/api/debug", debug::router())
        .merge(cached_routes)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
