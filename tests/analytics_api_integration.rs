//! Integration tests for the dashboard analytics endpoint
//!
//! Clicks are written straight into storage with controlled timestamps and
//! signals, then the report is read back through the API router.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use clicktrail::analytics::NewClick;
use clicktrail::api;
use clicktrail::auth::AuthService;
use clicktrail::config::{AuthConfig, AuthMode};
use clicktrail::models::{CampaignTags, ShortLink};
use clicktrail::storage::{SqliteStorage, Storage};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const USER: &str = "analyst";
const HOUR: i64 = 60 * 60;

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Auth disabled: every request acts as `USER`
fn create_test_auth_service() -> Arc<AuthService> {
    let config = AuthConfig {
        mode: AuthMode::None,
        dev_user_id: USER.to_string(),
        jwt: None,
    };
    Arc::new(AuthService::new(&config).unwrap())
}

fn create_router(storage: &Arc<dyn Storage>) -> Router {
    api::create_api_router(
        Arc::clone(storage),
        create_test_auth_service(),
        "http://sho.rt".to_string(),
    )
}

async fn create_link(storage: &Arc<dyn Storage>, short_id: &str, user: &str) -> ShortLink {
    storage
        .create_link(short_id, "https://example.com", Some(user), &CampaignTags::default())
        .await
        .unwrap()
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn click(short_link_id: i64, is_unique: bool, created_at: i64) -> NewClick {
    NewClick {
        short_link_id,
        ip_hash: "fingerprint".to_string(),
        user_agent: None,
        browser: None,
        os: None,
        device: None,
        referer: None,
        referer_domain: None,
        tags: CampaignTags::default(),
        country: None,
        region: None,
        city: None,
        is_unique,
        created_at,
    }
}

async fn get_report(app: &Router, query: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/dashboard/analytics{query}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_empty_click_table_returns_empty_report_with_links() {
    let storage = create_test_storage().await;
    let link = create_link(&storage, "empty01", USER).await;
    let app = create_router(&storage);

    let (status, report) = get_report(&app, "").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        report["overview"],
        json!({"totalClicks": 0, "uniqueClicks": 0, "repeatClicks": 0, "uniqueRate": 0})
    );
    assert_eq!(report["geography"], json!([]));
    assert_eq!(report["trafficSources"]["categories"], json!([]));
    assert_eq!(report["trafficSources"]["referers"], json!([]));
    assert_eq!(report["utm"]["campaigns"], json!([]));
    assert_eq!(report["technology"]["browsers"], json!([]));
    assert_eq!(report["technology"]["devices"], json!([]));
    assert_eq!(report["timeline"], json!([]));
    assert_eq!(
        report["links"],
        json!([{
            "id": link.id,
            "shortId": "empty01",
            "originalUrl": "https://example.com",
            "clicks": 0
        }])
    );
}

#[tokio::test]
async fn test_unique_rate_over_ten_clicks() {
    let storage = create_test_storage().await;
    let link = create_link(&storage, "rate001", USER).await;
    let t = now() - HOUR;

    for i in 0..10 {
        storage
            .insert_click(&click(link.id, i >= 3, t))
            .await
            .unwrap();
    }

    let (status, report) = get_report(&create_router(&storage), "?period=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        report["overview"],
        json!({"totalClicks": 10, "uniqueClicks": 7, "repeatClicks": 3, "uniqueRate": 70})
    );
    assert_eq!(report["timeline"][0]["clicks"], 10);
    assert_eq!(report["timeline"][0]["uniqueClicks"], 7);
}

#[tokio::test]
async fn test_paid_search_from_tags_without_referrer() {
    let storage = create_test_storage().await;
    let link = create_link(&storage, "paid001", USER).await;

    let mut c = click(link.id, true, now() - HOUR);
    c.tags = CampaignTags {
        utm_source: Some("google".into()),
        utm_medium: Some("cpc".into()),
        ..CampaignTags::default()
    };
    storage.insert_click(&c).await.unwrap();

    let (_, report) = get_report(&create_router(&storage), "").await;
    assert_eq!(
        report["trafficSources"]["categories"],
        json!([{"source": "Paid Search", "count": 1}])
    );
    assert_eq!(
        report["utm"]["campaigns"],
        json!([{"campaign": "N/A", "source": "google", "medium": "cpc", "clicks": 1}])
    );
    assert_eq!(
        report["trafficSources"]["referers"],
        json!([{"domain": "Direct", "clicks": 1}])
    );
}

#[tokio::test]
async fn test_missing_signals_fall_into_unknown_buckets() {
    let storage = create_test_storage().await;
    let link = create_link(&storage, "null001", USER).await;
    let t = now() - HOUR;

    let mut chrome = click(link.id, true, t);
    chrome.browser = Some("Chrome".into());
    chrome.device = Some("desktop".into());
    chrome.referer_domain = Some("t.co".into());
    storage.insert_click(&chrome).await.unwrap();
    storage.insert_click(&chrome).await.unwrap();
    storage.insert_click(&click(link.id, true, t)).await.unwrap();

    let (_, report) = get_report(&create_router(&storage), "").await;
    assert_eq!(report["geography"], json!([{"country": "Unknown", "clicks": 3}]));
    assert_eq!(
        report["technology"]["browsers"],
        json!([{"browser": "Chrome", "clicks": 2}, {"browser": "Unknown", "clicks": 1}])
    );
    assert_eq!(
        report["technology"]["devices"],
        json!([{"device": "desktop", "clicks": 2}, {"device": "Unknown", "clicks": 1}])
    );
    assert_eq!(
        report["trafficSources"]["categories"],
        json!([{"source": "Messengers", "count": 2}, {"source": "Direct", "count": 1}])
    );
}

#[tokio::test]
async fn test_one_day_period_excludes_older_clicks() {
    let storage = create_test_storage().await;
    let link = create_link(&storage, "aged001", USER).await;
    let t = now();

    storage
        .insert_click(&click(link.id, true, t - 25 * HOUR))
        .await
        .unwrap();
    storage
        .insert_click(&click(link.id, true, t - HOUR))
        .await
        .unwrap();

    let app = create_router(&storage);
    let (_, day) = get_report(&app, "?period=1").await;
    assert_eq!(day["overview"]["totalClicks"], 1);

    let (_, week) = get_report(&app, "?period=7").await;
    assert_eq!(week["overview"]["totalClicks"], 2);
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let storage = create_test_storage().await;
    let link = create_link(&storage, "same001", USER).await;
    let t = now() - 2 * HOUR;
    for i in 0..4 {
        let mut c = click(link.id, i % 2 == 0, t - i * HOUR);
        c.referer_domain = Some("news.example.org".into());
        storage.insert_click(&c).await.unwrap();
    }

    let app = create_router(&storage);
    let (_, first) = get_report(&app, "?period=30").await;
    let (_, second) = get_report(&app, "?period=30").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_link_filter() {
    let storage = create_test_storage().await;
    let a = create_link(&storage, "filtA01", USER).await;
    let b = create_link(&storage, "filtB01", USER).await;
    let t = now() - HOUR;
    storage.insert_click(&click(a.id, true, t)).await.unwrap();
    storage.insert_click(&click(b.id, true, t)).await.unwrap();
    storage.insert_click(&click(b.id, false, t)).await.unwrap();

    let app = create_router(&storage);

    let (_, only_a) = get_report(&app, &format!("?linkId={}", a.id)).await;
    assert_eq!(only_a["overview"]["totalClicks"], 1);

    let (_, only_b) = get_report(&app, &format!("?linkId={}", b.id)).await;
    assert_eq!(only_b["overview"]["totalClicks"], 2);
    assert_eq!(only_b["overview"]["repeatClicks"], 1);

    // An id that cannot be interpreted matches nothing, but links stay listed
    let (status, garbage) = get_report(&app, "?linkId=not-a-number").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(garbage["overview"]["totalClicks"], 0);
    assert_eq!(garbage["links"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_other_users_clicks_are_invisible() {
    let storage = create_test_storage().await;
    let mine = create_link(&storage, "mine001", USER).await;
    let theirs = create_link(&storage, "them001", "someone-else").await;
    let t = now() - HOUR;
    storage.insert_click(&click(mine.id, true, t)).await.unwrap();
    storage.insert_click(&click(theirs.id, true, t)).await.unwrap();

    let app = create_router(&storage);
    let (_, report) = get_report(&app, "").await;
    assert_eq!(report["overview"]["totalClicks"], 1);
    assert_eq!(report["links"].as_array().unwrap().len(), 1);

    // Filtering on another user's link yields nothing
    let (_, foreign) = get_report(&app, &format!("?linkId={}", theirs.id)).await;
    assert_eq!(foreign["overview"]["totalClicks"], 0);
}

#[tokio::test]
async fn test_invalid_period_is_rejected() {
    let storage = create_test_storage().await;
    let app = create_router(&storage);

    for query in ["?period=14", "?period=abc", "?period=0"] {
        let (status, body) = get_report(&app, query).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
        assert_eq!(body["error"], "Invalid period");
    }
}
