use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use folio_api_types::{Profile, Snapshot};

use crate::{
    application::error::HttpError,
    infra::kv::{BLURB_KEY, KvError, PROFILE_KEY},
};

use super::HttpState;

/// The latest persisted snapshot; either half may be missing on a cold start.
///
/// An empty snapshot is marked `no-store` so a profile written elsewhere shows up
/// on the next read.
pub(super) async fn profile(State(state): State<HttpState>) -> Response {
    match read_snapshot(&state).await {
        Ok(snapshot) if snapshot.is_empty() => {
            let mut response = Json(snapshot).into_response();
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => HttpError::from_error(
            "infra::http::public::profile",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read profile",
            &err,
        )
        .into_response(),
    }
}

async fn read_snapshot(state: &HttpState) -> Result<Snapshot, KvError> {
    let profile = state.kv.get::<Profile>(PROFILE_KEY).await?;
    let blurb = state.kv.get::<String>(BLURB_KEY).await?;
    Ok(Snapshot { profile, blurb })
}
