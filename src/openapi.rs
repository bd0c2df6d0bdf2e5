use crate::handlers;
use crate::models::*;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Coverage API", description = "Life cover estimation with weather and market enrichment"),
    paths(
        handlers::health,
        handlers::calculate_coverage,
        handlers::list_coverage_requests,
        handlers::list_api_responses,
        handlers::db_stats,
    ),
    components(schemas(
        CoverageForm,
        CoverageQuote,
        CoverageResponse,
        WeatherInfo,
        MarketInfo,
        CoverageRequestRecord,
        CoverageRequestList,
        ApiKind,
        ApiCallRecord,
        ApiCallList,
        ConnectionState,
        DatabaseCounts,
        ConnectionInfo,
        DbStats,
        DbStatsResponse,
        EnvironmentCheck,
        HealthStatus,
    ))
)]
pub struct ApiDoc;
