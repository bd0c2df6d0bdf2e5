use crate::config::{redact_database_url, Config};
use crate::db_storage::CoverageStore;
use crate::errors::{AppError, ResultExt};
use crate::models::*;
use crate::services::CoverageService;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

/// Most recent coverage requests returned by `GET /api/coverage-requests`.
pub const COVERAGE_REQUESTS_LIMIT: i64 = 50;
/// Most recent API call records returned by `GET /api/api-responses`.
pub const API_RESPONSES_LIMIT: i64 = 100;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistence handle shared with the services.
    pub store: Arc<dyn CoverageStore>,
    /// Application configuration.
    pub config: Config,
    /// Coverage calculation flow.
    pub coverage: CoverageService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn CoverageStore>) -> Self {
        let coverage = CoverageService::new(&config, store.clone());
        Self {
            store,
            config,
            coverage,
        }
    }
}

/// Liveness check.
///
/// Reports database connectivity and which secrets are configured.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthStatus))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let connected = state.store.ping().await;
    let health = HealthStatus {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        database: ConnectionState::from_connected(connected),
        environment: EnvironmentCheck {
            has_weather_key: state.config.has_weather_key(),
            has_database_url: state.config.database_url_configured,
        },
    };
    tracing::debug!("Health check: {:?}", health);
    Json(health)
}

/// POST /api/calculate-coverage
///
/// Validates the form, enriches it with weather and market data, and returns
/// the recommended coverage. The submission is saved in the background.
#[utoipa::path(
    post,
    path = "/api/calculate-coverage",
    request_body = CoverageForm,
    responses(
        (status = 200, description = "Coverage computed", body = CoverageResponse),
        (status = 400, description = "Missing or invalid field"),
        (status = 500, description = "Unexpected failure")
    )
)]
pub async fn calculate_coverage(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CoverageForm>, JsonRejection>,
) -> Result<Json<CoverageResponse>, AppError> {
    tracing::info!("New coverage calculation request received");
    let Json(form) = payload.map_err(|rejection| {
        tracing::info!("Rejected request body: {}", rejection.body_text());
        AppError::from(rejection)
    })?;
    tracing::debug!("Request body: {:?}", form);

    let quote = state.coverage.calculate(&form).await?;

    Ok(Json(CoverageResponse {
        success: true,
        data: quote,
    }))
}

/// GET /api/coverage-requests
#[utoipa::path(
    get,
    path = "/api/coverage-requests",
    responses(
        (status = 200, description = "Most recent submissions, newest first", body = CoverageRequestList),
        (status = 500, description = "Store unavailable")
    )
)]
pub async fn list_coverage_requests(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CoverageRequestList>, AppError> {
    let requests = state
        .store
        .recent_coverage_requests(COVERAGE_REQUESTS_LIMIT)
        .await
        .context("Failed to fetch requests")?;
    tracing::info!("Found {} coverage requests", requests.len());

    Ok(Json(CoverageRequestList {
        success: true,
        count: requests.len(),
        data: requests,
    }))
}

/// GET /api/api-responses
#[utoipa::path(
    get,
    path = "/api/api-responses",
    responses(
        (status = 200, description = "Most recent enrichment calls, newest first", body = ApiCallList),
        (status = 500, description = "Store unavailable")
    )
)]
pub async fn list_api_responses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiCallList>, AppError> {
    let responses = state
        .store
        .recent_api_calls(API_RESPONSES_LIMIT)
        .await
        .context("Failed to fetch API responses")?;
    tracing::info!("Found {} API responses", responses.len());

    Ok(Json(ApiCallList {
        success: true,
        count: responses.len(),
        data: responses,
    }))
}

/// GET /api/db-stats
#[utoipa::path(
    get,
    path = "/api/db-stats",
    responses(
        (status = 200, description = "Connection state and record counts", body = DbStatsResponse),
        (status = 500, description = "Store unavailable")
    )
)]
pub async fn db_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DbStatsResponse>, AppError> {
    let connected = state.store.ping().await;
    let coverage_requests = state
        .store
        .count_coverage_requests()
        .await
        .context("Failed to get database stats")?;
    let api_responses = state
        .store
        .count_api_calls()
        .await
        .context("Failed to get database stats")?;

    let stats = DbStats {
        database: DatabaseCounts {
            state: ConnectionState::from_connected(connected),
            coverage_requests,
            api_responses,
        },
        connection: ConnectionInfo {
            uri: redact_database_url(&state.config.database_url),
            connected,
        },
    };
    tracing::info!("Database stats: {:?}", stats);

    Ok(Json(DbStatsResponse {
        success: true,
        stats,
    }))
}
