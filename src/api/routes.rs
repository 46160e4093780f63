use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::analytics::AnalyticsEngine;
use crate::auth::{auth_middleware, AuthService};
use crate::storage::Storage;

use super::analytics::get_analytics;
use super::handlers::{
    create_link, create_public_link, delete_link, get_stats, health_check, list_links, AppState,
};

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    auth_service: Arc<AuthService>,
    redirect_base_url: String,
) -> Router {
    let state = Arc::new(AppState {
        engine: AnalyticsEngine::new(Arc::clone(&storage)),
        storage,
        redirect_base_url: redirect_base_url.trim_end_matches('/').to_string(),
    });

    let protected_routes = Router::new()
        .route("/api/shorten", post(create_link))
        .route("/api/dashboard/analytics", get(get_analytics))
        .route("/api/dashboard/links", get(list_links))
        .route("/api/dashboard/links/{id}", delete(delete_link))
        .route("/api/dashboard/stats", get(get_stats))
        .route_layer(middleware::from_fn(move |req: Request, next: Next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, req, next)
        }))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/public/shorten", post(create_public_link))
        .with_state(state)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
}
