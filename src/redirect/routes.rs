use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::analytics::IdentityHasher;
use crate::config::AnalyticsConfig;
use crate::storage::Storage;

use super::handlers::{health_check, redirect_link, RedirectState};
use super::pipeline::RecordingPipeline;

pub fn create_redirect_router(
    storage: Arc<dyn Storage>,
    analytics: &AnalyticsConfig,
    app_root_url: String,
) -> Router {
    let pipeline = RecordingPipeline::new(
        Arc::clone(&storage),
        IdentityHasher::new(analytics.ip_hash_salt.clone()),
        analytics.dedup_window(),
    );

    let state = Arc::new(RedirectState {
        storage,
        pipeline,
        app_root_url,
    });

    Router::new()
        .route("/", get(health_check))
        .route("/{short_id}", get(redirect_link))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
