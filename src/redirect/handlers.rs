use axum::{
    extract::{Path, State},
    http::{header, header::HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use super::pipeline::{build_target_url, RecordingPipeline};
use crate::storage::Storage;

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
    pub pipeline: RecordingPipeline,
    /// Where visitors land when a short link cannot be served
    pub app_root_url: String,
}

/// 302 Found to `location`, or `None` if it is not a valid header value
fn found(location: &str) -> Option<Response> {
    let value = HeaderValue::from_str(location).ok()?;
    Some((StatusCode::FOUND, [(header::LOCATION, value)]).into_response())
}

fn redirect_to_root(state: &RedirectState) -> Response {
    found(&state.app_root_url).unwrap_or_else(|| {
        error!(app_root_url = %state.app_root_url, "application root is not a valid Location");
        StatusCode::FOUND.into_response()
    })
}

/// Resolve a short id, record the visit and redirect.
///
/// Every failure degrades to a redirect to the application root; recording
/// failures do not affect the redirect at all.
pub async fn redirect_link(
    State(state): State<Arc<RedirectState>>,
    Path(short_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let handler_start = Instant::now();

    let link = match state.storage.get_link(&short_id).await {
        Ok(Some(link)) => link,
        Ok(None) => {
            debug!(%short_id, "unknown short id, redirecting to root");
            return redirect_to_root(&state);
        }
        Err(err) => {
            error!(%short_id, error = %err, "short link lookup failed");
            return redirect_to_root(&state);
        }
    };

    let now = chrono::Utc::now().timestamp();
    if let Err(err) = state.pipeline.record_visit(&link, &headers, now).await {
        warn!(%short_id, error = %err, "failed to record click, redirecting anyway");
    }

    let target = build_target_url(&link);
    debug!(
        %short_id,
        elapsed_ms = handler_start.elapsed().as_millis() as u64,
        "redirecting"
    );

    match found(&target) {
        Some(response) => response,
        None => {
            warn!(%short_id, "target URL is not a valid Location header");
            redirect_to_root(&state)
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
