use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

use crate::analytics::{AnalyticsEngine, ClickFilter};
use crate::auth::AuthClaims;
use crate::models::{CampaignTags, CreateLinkRequest, ShortLink};
use crate::storage::{Storage, StorageError};

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub engine: AnalyticsEngine,
    /// Origin short URLs are built on, without a trailing slash
    pub redirect_base_url: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn internal_error() -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

pub(crate) fn rfc3339(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

const SHORT_ID_LENGTH: usize = 7;
const SHORT_ID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_GENERATION_ATTEMPTS: usize = 10;

/// Generate a random short id
pub fn generate_short_id() -> String {
    (0..SHORT_ID_LENGTH)
        .map(|_| {
            let index = rand::random::<u32>() as usize % SHORT_ID_ALPHABET.len();
            SHORT_ID_ALPHABET[index] as char
        })
        .collect()
}

/// Trim the input, default the scheme to https and require an absolute URL
pub fn normalize_url(raw: &str) -> Option<Url> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    let lower = cleaned.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        cleaned.to_string()
    } else if cleaned.starts_with("//") {
        format!("https:{cleaned}")
    } else {
        format!("https://{cleaned}")
    };

    Url::parse(&candidate).ok().filter(Url::has_host)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenResponse {
    pub id: i64,
    pub short: String,
    pub target: String,
    pub short_id: String,
    pub clicks: i64,
    pub created_at: String,
}

async fn shorten(
    state: &AppState,
    owner: Option<&str>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<Json<ShortenResponse>, ApiError> {
    let Ok(Json(request)) = payload else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid body"));
    };
    let Some(Value::String(raw_url)) = request.url else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid body"));
    };
    let target = normalize_url(&raw_url)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid URL"))?;

    let tags = request
        .utm_params
        .as_ref()
        .map(CampaignTags::from_params)
        .unwrap_or_default();

    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let short_id = generate_short_id();

        match state.storage.short_id_exists(&short_id).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "short id lookup failed");
                return Err(internal_error());
            }
        }

        match state
            .storage
            .create_link(&short_id, target.as_str(), owner, &tags)
            .await
        {
            Ok(link) => {
                info!(short_id = %link.short_id, owned = owner.is_some(), "created short link");
                return Ok(Json(ShortenResponse {
                    id: link.id,
                    short: format!("{}/{}", state.redirect_base_url, link.short_id),
                    target: link.original_url,
                    short_id: link.short_id,
                    clicks: 0,
                    created_at: rfc3339(link.created_at),
                }));
            }
            Err(StorageError::Conflict) => {
                warn!(%short_id, "short id taken between check and insert, retrying");
            }
            Err(StorageError::Other(e)) => {
                error!(error = %e, "failed to save short link");
                return Err(internal_error());
            }
        }
    }

    error!("exhausted short id generation attempts");
    Err(api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to generate unique ID",
    ))
}

/// Create a short link owned by the caller
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthClaims>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<Json<ShortenResponse>, ApiError> {
    shorten(&state, Some(&claims.user_id), payload).await
}

/// Create an anonymous short link
pub async fn create_public_link(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<Json<ShortenResponse>, ApiError> {
    shorten(&state, None, payload).await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkView {
    pub id: i64,
    pub original_url: String,
    pub short_id: String,
    pub short_url: String,
    pub clicks: i64,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl LinkView {
    fn new(link: ShortLink, redirect_base_url: &str) -> Self {
        let CampaignTags {
            utm_source,
            utm_medium,
            utm_campaign,
            utm_term,
            utm_content,
        } = link.tags;

        Self {
            id: link.id,
            short_url: format!("{}/{}", redirect_base_url, link.short_id),
            original_url: link.original_url,
            short_id: link.short_id,
            clicks: link.clicks,
            utm_source,
            utm_medium,
            utm_campaign,
            utm_term,
            utm_content,
            created_at: rfc3339(link.created_at),
            updated_at: rfc3339(link.updated_at),
        }
    }
}

/// List the caller's links, newest first
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthClaims>,
) -> Result<Json<Vec<LinkView>>, ApiError> {
    match state.storage.list_links(&claims.user_id).await {
        Ok(links) => Ok(Json(
            links
                .into_iter()
                .map(|link| LinkView::new(link, &state.redirect_base_url))
                .collect(),
        )),
        Err(e) => {
            error!(error = %e, "failed to list links");
            Err(internal_error())
        }
    }
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Delete one of the caller's links together with its click records
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let not_found = || api_error(StatusCode::NOT_FOUND, "Link not found or access denied");
    let id: i64 = id.parse().map_err(|_| not_found())?;

    match state.storage.get_owned_link(id, &claims.user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(not_found()),
        Err(e) => {
            error!(error = %e, id, "failed to look up link for deletion");
            return Err(internal_error());
        }
    }

    match state.storage.delete_link(id).await {
        Ok(true) => {
            info!(id, "deleted short link");
            Ok(Json(DeleteResponse { success: true }))
        }
        Ok(false) => Err(not_found()),
        Err(e) => {
            error!(error = %e, id, "failed to delete link");
            Err(internal_error())
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_links: i64,
    pub total_clicks: i64,
    pub today_clicks: i64,
}

/// Link count, summed counters and clicks recorded since UTC midnight
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthClaims>,
) -> Result<Json<StatsResponse>, ApiError> {
    let now = Utc::now();
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|at| at.and_utc().timestamp())
        .unwrap_or_else(|| now.timestamp());

    let today = ClickFilter {
        user_id: claims.user_id.clone(),
        link_id: None,
        since: midnight,
        until: now.timestamp(),
    };

    let (totals, today_clicks) = tokio::join!(
        state.storage.link_totals(&claims.user_id),
        state.storage.count_clicks(&today, false),
    );

    match (totals, today_clicks) {
        (Ok(totals), Ok(today_clicks)) => Ok(Json(StatsResponse {
            total_links: totals.total_links,
            total_clicks: totals.total_clicks,
            today_clicks,
        })),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "failed to compute dashboard stats");
            Err(internal_error())
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_use_the_alphabet() {
        for _ in 0..100 {
            let id = generate_short_id();
            assert_eq!(id.len(), SHORT_ID_LENGTH);
            assert!(id.bytes().all(|b| SHORT_ID_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn normalization_adds_scheme() {
        assert_eq!(
            normalize_url("  example.com/path ").map(String::from),
            Some("https://example.com/path".to_string())
        );
        assert_eq!(
            normalize_url("HTTP://Example.com").map(String::from),
            Some("http://example.com/".to_string())
        );
        assert_eq!(
            normalize_url("//cdn.example.com/a").map(String::from),
            Some("https://cdn.example.com/a".to_string())
        );
    }

    #[test]
    fn normalization_rejects_garbage() {
        assert!(normalize_url("").is_none());
        assert!(normalize_url("   ").is_none());
        assert!(normalize_url("http://").is_none());
        assert!(normalize_url("exa mple.com").is_none());
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        assert_eq!(rfc3339(1_709_337_600), "2024-03-02T00:00:00.000Z");
    }
}
