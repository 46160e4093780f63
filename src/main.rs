use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use clicktrail::api;
use clicktrail::auth::AuthService;
use clicktrail::config::{AuthMode, Config, DatabaseBackend};
use clicktrail::logging;
use clicktrail::redirect;
use clicktrail::storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    let auth_service = Arc::new(AuthService::new(&config.auth)?);
    match config.auth.mode {
        AuthMode::None => {
            info!(
                "🔓 Authentication is disabled - all dashboard requests act as '{}'",
                config.auth.dev_user_id
            );
        }
        AuthMode::Jwt => match config.auth.jwt.as_ref().and_then(|jwt| jwt.issuer.as_deref()) {
            Some(issuer) => info!("🔐 JWT authentication enabled (issuer: {issuer})"),
            None => info!("🔐 JWT authentication enabled"),
        },
    }

    let api_router = api::create_api_router(
        Arc::clone(&storage),
        auth_service,
        config.redirect_base_url.clone(),
    );
    let redirect_router = redirect::create_redirect_router(
        Arc::clone(&storage),
        &config.analytics,
        config.app_root_url.clone(),
    );

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);
    info!(
        "   - Short links resolve at {}/<shortId>",
        config.redirect_base_url
    );

    // Run both servers concurrently
    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(redirect_listener, redirect_router),
    )?;

    Ok(())
}
