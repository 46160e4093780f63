//! Redirect integration tests
//!
//! These tests drive the redirect router end to end: lookup, click
//! recording, uniqueness over the trailing window and the fallback to the
//! application root.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    Router,
};
use clicktrail::analytics::{ClickDeduplicator, IdentityHasher};
use clicktrail::config::AnalyticsConfig;
use clicktrail::models::{CampaignTags, ShortLink};
use clicktrail::redirect::{self, pipeline::RecordingPipeline};
use clicktrail::storage::{SqliteStorage, Storage};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const APP_ROOT: &str = "http://app.test/";
const CHROME_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn test_analytics_config() -> AnalyticsConfig {
    AnalyticsConfig {
        ip_hash_salt: "test-salt".to_string(),
        dedup_window_hours: 24,
    }
}

fn create_router(storage: &Arc<dyn Storage>) -> Router {
    redirect::create_redirect_router(
        Arc::clone(storage),
        &test_analytics_config(),
        APP_ROOT.to_string(),
    )
}

async fn create_link(storage: &Arc<dyn Storage>, short_id: &str, url: &str, tags: CampaignTags) -> ShortLink {
    storage
        .create_link(short_id, url, Some("owner"), &tags)
        .await
        .unwrap()
}

fn visit(short_id: &str, ip: &str, user_agent: Option<&str>, referer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(format!("/{short_id}"))
        .header("x-forwarded-for", ip);
    if let Some(ua) = user_agent {
        builder = builder.header(header::USER_AGENT, ua);
    }
    if let Some(referer) = referer {
        builder = builder.header(header::REFERER, referer);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_redirect_to_original_url() {
    let storage = create_test_storage().await;
    create_link(&storage, "abcDEF1", "https://example.com/destination", CampaignTags::default()).await;

    let response = create_router(&storage)
        .oneshot(visit("abcDEF1", "203.0.113.7", Some(CHROME_UA), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "https://example.com/destination");
}

#[tokio::test]
async fn test_stored_tags_override_query_parameters() {
    let storage = create_test_storage().await;
    let tags = CampaignTags {
        utm_source: Some("newsletter".into()),
        utm_medium: Some("email".into()),
        ..CampaignTags::default()
    };
    create_link(
        &storage,
        "tagged1",
        "https://example.com/landing?utm_source=old&page=2",
        tags,
    )
    .await;

    let response = create_router(&storage)
        .oneshot(visit("tagged1", "203.0.113.7", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "https://example.com/landing?utm_source=newsletter&page=2&utm_medium=email"
    );
}

#[tokio::test]
async fn test_unknown_short_id_redirects_to_root() {
    let storage = create_test_storage().await;

    let response = create_router(&storage)
        .oneshot(visit("nothere", "203.0.113.7", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), APP_ROOT);
    assert!(!storage.has_clicks().await.unwrap());
}

#[tokio::test]
async fn test_visit_records_click_details() {
    let storage = create_test_storage().await;
    let tags = CampaignTags {
        utm_campaign: Some("launch".into()),
        ..CampaignTags::default()
    };
    let link = create_link(&storage, "record1", "https://example.com", tags).await;

    let response = create_router(&storage)
        .oneshot(visit(
            "record1",
            "198.51.100.4, 10.0.0.1",
            Some(CHROME_UA),
            Some("https://www.google.com/search?q=x"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let link = storage.get_link(&link.short_id).await.unwrap().unwrap();
    assert_eq!(link.clicks, 1);

    let clicks = storage.recent_clicks(link.id, 10).await.unwrap();
    assert_eq!(clicks.len(), 1);
    let click = &clicks[0];
    assert!(click.is_unique);
    assert_eq!(click.browser.as_deref(), Some("Chrome"));
    assert_eq!(click.os.as_deref(), Some("Windows"));
    assert_eq!(click.device.as_deref(), Some("desktop"));
    assert_eq!(click.referer_domain.as_deref(), Some("google.com"));
    assert_eq!(click.tags.utm_campaign.as_deref(), Some("launch"));
    assert!(click.country.is_none());

    // The raw IP never reaches storage
    assert!(!click.ip_hash.contains("198.51.100.4"));
    assert_eq!(
        click.ip_hash,
        IdentityHasher::new("test-salt").fingerprint("198.51.100.4")
    );
}

#[tokio::test]
async fn test_repeat_visit_is_not_unique() {
    let storage = create_test_storage().await;
    let link = create_link(&storage, "repeat1", "https://example.com", CampaignTags::default()).await;
    let app = create_router(&storage);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(visit("repeat1", "203.0.113.9", Some(CHROME_UA), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }
    // Same address, different browser: a new unique visitor
    app.clone()
        .oneshot(visit("repeat1", "203.0.113.9", Some("curl/8.0"), None))
        .await
        .unwrap();

    let clicks = storage.recent_clicks(link.id, 10).await.unwrap();
    assert_eq!(clicks.len(), 3);
    let unique = clicks.iter().filter(|c| c.is_unique).count();
    assert_eq!(unique, 2);

    let link = storage.get_link("repeat1").await.unwrap().unwrap();
    assert_eq!(link.clicks, 3);
}

#[tokio::test]
async fn test_uniqueness_resets_after_window() {
    let storage = create_test_storage().await;
    let link = create_link(&storage, "window1", "https://example.com", CampaignTags::default()).await;
    let window = Duration::from_secs(24 * 60 * 60);
    let pipeline = RecordingPipeline::new(
        Arc::clone(&storage),
        IdentityHasher::new("test-salt"),
        window,
    );

    let mut headers = HeaderMap::new();
    headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.1"));
    headers.insert(header::USER_AGENT, HeaderValue::from_static(CHROME_UA));

    let start = 1_700_000_000;
    let hour = 60 * 60;
    pipeline.record_visit(&link, &headers, start).await.unwrap();
    pipeline
        .record_visit(&link, &headers, start + 23 * hour)
        .await
        .unwrap();
    pipeline
        .record_visit(&link, &headers, start + 48 * hour)
        .await
        .unwrap();

    let clicks = storage.recent_clicks(link.id, 10).await.unwrap();
    let flags: Vec<bool> = clicks.iter().map(|c| c.is_unique).collect();
    // Newest first
    assert_eq!(flags, vec![true, false, true]);

    let dedup = ClickDeduplicator::new(Arc::clone(&storage), window);
    assert_eq!(dedup.window(), window);
    let fingerprint = IdentityHasher::new("test-salt").fingerprint("192.0.2.1");
    assert!(!dedup
        .is_unique(link.id, &fingerprint, Some(CHROME_UA), start + 49 * hour)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_failed_recording_still_redirects_to_target() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let storage = SqliteStorage::from_pool(pool.clone());
    storage.init().await.unwrap();
    let storage: Arc<dyn Storage> = Arc::new(storage);
    create_link(&storage, "broken1", "https://example.com/still-here", CampaignTags::default()).await;

    // Lookups keep working while every click query fails
    sqlx::query("DROP TABLE click_analytics")
        .execute(&pool)
        .await
        .unwrap();

    let response = create_router(&storage)
        .oneshot(visit("broken1", "203.0.113.7", Some(CHROME_UA), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "https://example.com/still-here");

    // Recording stopped before the counter update
    let link = storage.get_link("broken1").await.unwrap().unwrap();
    assert_eq!(link.clicks, 0);
}

#[tokio::test]
async fn test_concurrent_redirects() {
    let storage = create_test_storage().await;
    create_link(&storage, "busy123", "https://example.com/busy", CampaignTags::default()).await;
    let app = create_router(&storage);

    let mut handles = vec![];
    for i in 0..20 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.oneshot(visit("busy123", &format!("198.51.100.{i}"), Some(CHROME_UA), None))
                .await
                .unwrap()
                .status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::FOUND);
    }

    let link = storage.get_link("busy123").await.unwrap().unwrap();
    assert_eq!(link.clicks, 20);
}

#[tokio::test]
async fn test_health_check() {
    let storage = create_test_storage().await;
    let response = create_router(&storage)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "OK");
}
