//! Response cache fronting the public snapshot endpoint.
//!
//! Entries live for a bounded time and are also dropped when the profile job
//! invalidates them after a write.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use metrics::counter;
use thiserror::Error;
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, warn};

/// Lifetime used when no explicit one is configured.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, StoredResponse>>>,
    max_age: Duration,
}

#[derive(Clone)]
struct StoredResponse {
    response: CachedResponse,
    stored_at: Instant,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE)
    }
}

impl ResponseCache {
    /// Entries older than `max_age` are treated as absent and dropped on read.
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: Arc::default(),
            max_age,
        }
    }

    pub async fn get(&self, key: &str) -> Option<Response<Body>> {
        {
            let guard = self.entries.read().await;
            match guard.get(key) {
                None => return None,
                Some(stored) if stored.stored_at.elapsed() < self.max_age => {
                    return Some(stored.response.clone().into_response());
                }
                Some(_) => {}
            }
        }

        let mut guard = self.entries.write().await;
        if guard
            .get(key)
            .is_some_and(|stored| stored.stored_at.elapsed() >= self.max_age)
        {
            guard.remove(key);
        }
        None
    }

    pub async fn put(&self, key: String, response: CachedResponse) {
        let mut guard = self.entries.write().await;
        guard.insert(
            key,
            StoredResponse {
                response,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn store_response(
        &self,
        key: &str,
        response: Response,
    ) -> Result<Response, (Response, CacheStoreError)> {
        let (rebuilt, cached) = buffer_response(response).await?;
        self.put(key.to_string(), cached).await;
        Ok(rebuilt)
    }

    /// Drop every entry, returning how many were removed.
    pub async fn invalidate_all(&self) -> usize {
        let mut guard = self.entries.write().await;
        let removed = guard.len();
        guard.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers: headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            body,
        }
    }

    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

pub fn should_store_response(response: &Response) -> bool {
    let headers = response.headers();
    let no_store = headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-store"));
    response.status().is_success() && !headers.contains_key(header::SET_COOKIE) && !no_store
}

pub async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
            let rebuilt = Response::from_parts(parts, Body::from(bytes));
            Ok((rebuilt, cached))
        }
        Err(error) => {
            let rebuilt = Response::from_parts(parts, Body::empty());
            Err((rebuilt, CacheStoreError::Buffer(error.to_string())))
        }
    }
}

/// Middleware serving cached GET responses and storing fresh successful ones.
pub async fn cache_responses(
    State(cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = request
        .uri()
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    if let Some(cached) = cache.get(&key).await {
        counter!("folio_response_cache_hit_total").increment(1);
        debug!(target = "folio::http::cache", cache = "response", key = %key, outcome = "hit", "serving cached response");
        return cached;
    }
    counter!("folio_response_cache_miss_total").increment(1);

    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    match cache.store_response(&key, response).await {
        Ok(response) => response,
        Err((response, error)) => {
            warn!(target = "folio::http::cache", cache = "response", key = %key, error = %error, "failed to cache response");
            response
        }
    }
}
