//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request-level errors go through
//! `ads::AdsError` and render as `kernel::error::AppError`.

use ads::domain::environment::Environment;
use ads::{AdsAppState, AdsConfig, ConfirmationCoordinator, PgAdsRepository, ads_routes};
use axum::{
    Router, http,
    http::{Method, header},
};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,ads=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Ads configuration; debug builds fall back to the development hosts
    let fallback = cfg!(debug_assertions).then_some(Environment::Development);
    let ads_config = AdsConfig::from_lookup_with(|key| env::var(key).ok(), fallback)?;
    tracing::info!(
        environment = %ads_config.environment,
        history_max_entries = ads_config.history_max_entries,
        transport_timeout_secs = ads_config.transport_timeout.as_secs(),
        "Ads configuration loaded"
    );

    // Database connection
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in environment"))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let state = AdsAppState::new(
        Arc::new(PgAdsRepository::new(pool.clone())),
        Arc::new(ads_config),
    );

    // Startup recovery: nothing can be in flight before the server starts
    state.coordinator.recover_reservations().await?;

    // Startup cleanup
    // Errors here should not prevent server startup
    if let Err(e) = state.coordinator.purge_redeemed(chrono::Utc::now()).await {
        tracing::warn!(
            error = %e,
            "Redeemed token cleanup failed, continuing anyway"
        );
    }

    tokio::spawn(run_maintenance(state.coordinator.clone()));

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api/ads", ads_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 31113));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically release attempts whose transport never reported back and
/// purge redeemed tokens past retention
async fn run_maintenance(coordinator: Arc<ConfirmationCoordinator<PgAdsRepository, PgAdsRepository>>) {
    let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
    loop {
        interval.tick().await;
        let now = chrono::Utc::now();

        let released = coordinator.release_stale_attempts(now).await;
        if released > 0 {
            tracing::info!(released, "Released stale confirmation attempts");
        }

        if let Err(e) = coordinator.purge_redeemed(now).await {
            tracing::warn!(error = %e, "Redeemed token cleanup failed");
        }
    }
}
