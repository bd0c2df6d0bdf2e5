use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use coverage_api::config::{redact_database_url, Config};
use coverage_api::db::{spawn_connection_monitor, Database};
use coverage_api::db_storage::{CoverageStore, PgCoverageStore};
use coverage_api::handlers::{self, AppState};
use coverage_api::openapi::ApiDoc;

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, builds the lazily connected store
/// and the enrichment clients, then serves the HTTP API. Neither a missing
/// weather key nor an unreachable database stops the server from starting.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coverage_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!(
        "Attempting to connect to database: {}",
        redact_database_url(&config.database_url)
    );
    let db = Database::connect_lazy(&config.database_url)?;
    let pg_store = PgCoverageStore::new(db.pool.clone());
    if let Err(e) = pg_store.ensure_schema().await {
        // Retried by the store and the connection monitor once the database is up
        tracing::error!("Database connection error: {}", e);
    }

    let store: Arc<dyn CoverageStore> = Arc::new(pg_store);
    spawn_connection_monitor(store.clone(), Duration::from_secs(30));

    let app_state = Arc::new(AppState::new(config.clone(), store));

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/calculate-coverage", post(handlers::calculate_coverage))
        .route("/api/coverage-requests", get(handlers::list_coverage_requests))
        .route("/api/api-responses", get(handlers::list_api_responses))
        .route("/api/db-stats", get(handlers::db_stats))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);
    tracing::info!(
        "Environment check - database URL: {}, weather API key: {}",
        if config.database_url_configured { "set" } else { "default" },
        if config.has_weather_key() { "set" } else { "missing" }
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
