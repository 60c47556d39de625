use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::application::{
    error::HttpError,
    trigger::{TriggerCredentials, bearer_token},
};

use super::HttpState;

const SOURCE: &str = "infra::http::cron";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct TriggerQuery {
    secret: Option<String>,
}

fn authorize(state: &HttpState, headers: &HeaderMap, query: &TriggerQuery) -> Result<(), HttpError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);
    let credentials = TriggerCredentials {
        bearer,
        query_secret: query.secret.as_deref(),
    };

    if state.guard.authorize(credentials) {
        return Ok(());
    }

    let detail = if !state.guard.is_configured() {
        "trigger secret is not configured"
    } else if bearer.is_none() && query.secret.is_none() {
        "no trigger credential presented"
    } else {
        "trigger credential did not match"
    };
    Err(HttpError::new(
        SOURCE,
        StatusCode::UNAUTHORIZED,
        "Unauthorized",
        detail,
    ))
}

pub(super) async fn update_profile(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<TriggerQuery>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers, &query) {
        return rejection.into_response();
    }

    info!(target = "folio::job", trigger = "http", "Profile update triggered");
    match state.job.run().await {
        Ok(report) => (StatusCode::OK, Json(report.response())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn reject_get(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<TriggerQuery>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers, &query) {
        return rejection.into_response();
    }

    let mut response = HttpError::new(
        SOURCE,
        StatusCode::METHOD_NOT_ALLOWED,
        "Method Not Allowed",
        "the update trigger only accepts POST",
    )
    .into_response();
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("POST"));
    response
}
