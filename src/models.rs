use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// ============ Database Models ============

/// One form submission together with the figures returned to the user.
///
/// Append-only: rows are written once and never updated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRequestRecord {
    /// Submission id, also the correlation id of its API call records.
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub city: String,
    pub annual_income: f64,
    pub dependents: i32,
    /// Always a non-negative multiple of one lakh.
    pub recommended_coverage: i64,
    pub monthly_premium: i64,
    /// Raw weather provider payload, if the lookup succeeded.
    #[schema(value_type = Option<Object>)]
    pub weather_data: Option<Value>,
    /// Raw crypto provider payload, if the lookup succeeded.
    #[schema(value_type = Option<Object>)]
    pub crypto_data: Option<Value>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Kind of outbound enrichment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    Weather,
    Crypto,
}

impl ApiKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKind::Weather => "weather",
            ApiKind::Crypto => "crypto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownApiKind(pub String);

impl std::fmt::Display for UnknownApiKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown api kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownApiKind {}

impl TryFrom<String> for ApiKind {
    type Error = UnknownApiKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "weather" => Ok(ApiKind::Weather),
            "crypto" => Ok(ApiKind::Crypto),
            _ => Err(UnknownApiKind(value)),
        }
    }
}

/// Log entry for a successful outbound enrichment call.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallRecord {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    #[serde(rename = "apiType")]
    pub kind: ApiKind,
    /// Target URL without scheme, e.g. `api.coindesk.com/v1/bpi/currentprice.json`.
    pub endpoint: String,
    #[schema(value_type = Object)]
    pub request: Value,
    #[schema(value_type = Object)]
    pub response: Value,
    /// Submission that triggered the call, if known.
    pub correlation_id: Option<Uuid>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl ApiCallRecord {
    pub fn new(
        kind: ApiKind,
        endpoint: impl Into<String>,
        request: Value,
        response: Value,
        correlation_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            endpoint: endpoint.into(),
            request,
            response,
            correlation_id,
            created_at: Utc::now(),
        }
    }
}

// ============ API Request Models ============

/// Raw body of `POST /api/calculate-coverage`.
///
/// Every field is kept as a raw JSON value so type mismatches reach
/// [`crate::validation::validate_form`] and come back as 400s. The form posts
/// numbers either as JSON numbers or as numeric strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoverageForm {
    #[schema(value_type = Option<String>)]
    pub name: Option<Value>,
    #[schema(value_type = Option<i64>)]
    pub age: Option<Value>,
    #[schema(value_type = Option<String>)]
    pub city: Option<Value>,
    #[schema(value_type = Option<f64>)]
    pub annual_income: Option<Value>,
    #[schema(value_type = Option<i64>)]
    pub dependents: Option<Value>,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicantProfile {
    pub name: String,
    pub age: u32,
    pub city: String,
    pub annual_income: f64,
    pub dependents: u32,
}

// ============ API Response Models ============

/// Summary of a successful weather lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherInfo {
    pub temperature: Option<f64>,
    pub description: Option<String>,
    pub city: Option<String>,
}

impl WeatherInfo {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            temperature: payload.pointer("/main/temp").and_then(|v| v.as_f64()),
            description: payload
                .pointer("/weather/0/description")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            city: payload
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

/// Summary of a successful crypto price lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    pub btc_price: Option<String>,
    pub last_updated: Option<String>,
}

impl MarketInfo {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            btc_price: payload
                .pointer("/bpi/USD/rate")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            last_updated: payload
                .pointer("/time/updated")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

/// Figures returned to the applicant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoverageQuote {
    pub coverage: i64,
    pub monthly_premium: i64,
    pub reasoning: String,
    pub weather_info: Option<WeatherInfo>,
    pub market_info: Option<MarketInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CoverageResponse {
    pub success: bool,
    pub data: CoverageQuote,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CoverageRequestList {
    pub success: bool,
    pub data: Vec<CoverageRequestRecord>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiCallList {
    pub success: bool,
    pub data: Vec<ApiCallRecord>,
    pub count: usize,
}

/// Persistence connection state as reported by `/health` and `/api/db-stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseCounts {
    pub state: ConnectionState,
    pub coverage_requests: i64,
    pub api_responses: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionInfo {
    /// Connection string with credentials masked.
    pub uri: String,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DbStats {
    pub database: DatabaseCounts,
    pub connection: ConnectionInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DbStatsResponse {
    pub success: bool,
    pub stats: DbStats,
}

/// Reports which secrets are present, never their values.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentCheck {
    pub has_weather_key: bool,
    pub has_database_url: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub database: ConnectionState,
    pub environment: EnvironmentCheck,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_weather_info_from_openweather_payload() {
        let payload = json!({
            "name": "Delhi",
            "main": { "temp": 42.5 },
            "weather": [{ "description": "clear sky" }]
        });
        let info = WeatherInfo::from_payload(&payload);
        assert_eq!(info.temperature, Some(42.5));
        assert_eq!(info.description.as_deref(), Some("clear sky"));
        assert_eq!(info.city.as_deref(), Some("Delhi"));
    }

    #[test]
    fn test_market_info_tolerates_missing_fields() {
        let info = MarketInfo::from_payload(&json!({ "bpi": {} }));
        assert_eq!(info.btc_price, None);
        assert_eq!(info.last_updated, None);
    }

    #[test]
    fn test_api_kind_round_trips_through_text_column() {
        assert_eq!(ApiKind::try_from("crypto".to_string()), Ok(ApiKind::Crypto));
        assert!(ApiKind::try_from("stocks".to_string()).is_err());
        assert_eq!(ApiKind::Weather.as_str(), "weather");
    }

    #[test]
    fn test_quote_serializes_missing_enrichment_as_null() {
        let quote = CoverageQuote {
            coverage: 9_600_000,
            monthly_premium: 86_400,
            reasoning: "r".to_string(),
            weather_info: None,
            market_info: None,
        };
        let value = serde_json::to_value(&quote).unwrap();
        assert_eq!(value["monthlyPremium"], 86_400);
        assert!(value["weatherInfo"].is_null());
        assert!(value["marketInfo"].is_null());
    }
}
