use crate::config::Config;
use crate::db_storage::CoverageStore;
use crate::errors::AppError;
use crate::estimator;
use crate::models::*;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of an enrichment lookup.
///
/// Provider failures never become request failures; they turn into
/// `Unavailable` and the estimate proceeds without that data.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Success(T),
    Unavailable(String),
}

impl<T> Lookup<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Lookup::Success(value) => Some(value),
            Lookup::Unavailable(_) => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Success(value) => Some(value),
            Lookup::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Lookup::Success(_))
    }
}

impl<T> From<Result<T, AppError>> for Lookup<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(value) => Lookup::Success(value),
            Err(e) => Lookup::Unavailable(e.to_string()),
        }
    }
}

/// Endpoint identifier recorded with each call: the URL without its scheme.
fn endpoint_id(url: &str) -> String {
    url.split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url)
        .to_string()
}

/// Sends `request` and decodes the JSON body, treating non-2xx as an error.
async fn get_json(request: reqwest::RequestBuilder, provider: &str) -> Result<Value, AppError> {
    let response = request.send().await.map_err(|e| {
        AppError::ExternalApiError(format!("{} request failed: {}", provider, e))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::ExternalApiError(format!(
            "{} returned status {}: {}",
            provider, status, error_text
        )));
    }

    response.json().await.map_err(|e| {
        AppError::ExternalApiError(format!("Failed to parse {} response: {}", provider, e))
    })
}

/// Stores the call log in a background task; failures are only logged.
fn spawn_record(store: Arc<dyn CoverageStore>, record: ApiCallRecord) {
    tokio::spawn(async move {
        match store.insert_api_call(&record).await {
            Ok(()) => tracing::debug!(
                "✓ {} API response saved: {}",
                record.kind.as_str(),
                record.id
            ),
            Err(e) => tracing::error!(
                "Failed to save {} API response: {}",
                record.kind.as_str(),
                e
            ),
        }
    });
}

/// Current weather by city (OpenWeatherMap `data/2.5/weather`, metric units).
#[derive(Clone)]
pub struct WeatherService {
    client: Client,
    url: String,
    api_key: Option<String>,
    store: Arc<dyn CoverageStore>,
}

impl WeatherService {
    pub fn new(config: &Config, client: Client, store: Arc<dyn CoverageStore>) -> Self {
        Self {
            client,
            url: config.weather_api_url.clone(),
            api_key: config.weather_api_key.clone(),
            store,
        }
    }

    pub async fn fetch(&self, city: &str, correlation_id: Option<Uuid>) -> Lookup<Value> {
        tracing::info!("Fetching weather data for: {}", city);
        match self.try_fetch(city).await {
            Ok(payload) => {
                tracing::info!("✓ Weather API response received");
                spawn_record(
                    self.store.clone(),
                    ApiCallRecord::new(
                        ApiKind::Weather,
                        endpoint_id(&self.url),
                        json!({ "city": city }),
                        payload.clone(),
                        correlation_id,
                    ),
                );
                Lookup::Success(payload)
            }
            Err(e) => {
                tracing::warn!("Weather lookup unavailable: {}", e);
                Lookup::Unavailable(e.to_string())
            }
        }
    }

    async fn try_fetch(&self, city: &str) -> Result<Value, AppError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AppError::ExternalApiError(
                "weather API key not configured".to_string(),
            ));
        };

        // Redact key from logs
        tracing::debug!("Weather API URL: {}?q={}&appid=[REDACTED]&units=metric", self.url, city);

        let request = self
            .client
            .get(&self.url)
            .query(&[("q", city), ("appid", api_key), ("units", "metric")]);
        get_json(request, "Weather API").await
    }
}

/// Current Bitcoin price index (CoinDesk `v1/bpi/currentprice.json`).
#[derive(Clone)]
pub struct CryptoService {
    client: Client,
    url: String,
    store: Arc<dyn CoverageStore>,
}

impl CryptoService {
    pub fn new(config: &Config, client: Client, store: Arc<dyn CoverageStore>) -> Self {
        Self {
            client,
            url: config.crypto_api_url.clone(),
            store,
        }
    }

    pub async fn fetch(&self, correlation_id: Option<Uuid>) -> Lookup<Value> {
        tracing::info!("Fetching crypto data...");
        let result = get_json(self.client.get(&self.url), "Crypto API").await;
        if let Ok(payload) = &result {
            tracing::info!("✓ Crypto API response received");
            spawn_record(
                self.store.clone(),
                ApiCallRecord::new(
                    ApiKind::Crypto,
                    endpoint_id(&self.url),
                    json!({}),
                    payload.clone(),
                    correlation_id,
                ),
            );
        }
        let lookup = Lookup::from(result);
        if let Lookup::Unavailable(reason) = &lookup {
            tracing::warn!("Crypto lookup unavailable: {}", reason);
        }
        lookup
    }
}

/// Both enrichment lookups for one submission.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub weather: Lookup<Value>,
    pub crypto: Lookup<Value>,
}

#[derive(Clone)]
pub struct EnrichmentClient {
    weather: WeatherService,
    crypto: CryptoService,
}

impl EnrichmentClient {
    pub fn new(config: &Config, store: Arc<dyn CoverageStore>) -> Self {
        // No timeout beyond the transport default
        let client = Client::new();
        Self {
            weather: WeatherService::new(config, client.clone(), store.clone()),
            crypto: CryptoService::new(config, client, store),
        }
    }

    /// Runs the weather and crypto lookups concurrently.
    pub async fn enrich(&self, city: &str, correlation_id: Option<Uuid>) -> Enrichment {
        let (weather, crypto) = tokio::join!(
            self.weather.fetch(city, correlation_id),
            self.crypto.fetch(correlation_id)
        );
        Enrichment { weather, crypto }
    }
}

/// Sequences a coverage calculation: validate, enrich, estimate, persist.
#[derive(Clone)]
pub struct CoverageService {
    enrichment: EnrichmentClient,
    store: Arc<dyn CoverageStore>,
}

impl CoverageService {
    pub fn new(config: &Config, store: Arc<dyn CoverageStore>) -> Self {
        Self {
            enrichment: EnrichmentClient::new(config, store.clone()),
            store,
        }
    }

    /// Returns the quote for `form`.
    ///
    /// Only invalid input fails the call; provider or database trouble degrades
    /// the result instead. Validation happens before any outbound call.
    pub async fn calculate(&self, form: &CoverageForm) -> Result<CoverageQuote, AppError> {
        let profile = crate::validation::validate_form(form).map_err(|e| {
            tracing::info!("Validation failed: {}", e);
            e
        })?;
        tracing::info!("✓ Input validation passed");

        let request_id = Uuid::new_v4();
        let enrichment = self.enrichment.enrich(&profile.city, Some(request_id)).await;
        tracing::info!(
            "Enrichment - weather: {}, crypto: {}",
            if enrichment.weather.is_available() { "ok" } else { "unavailable" },
            if enrichment.crypto.is_available() { "ok" } else { "unavailable" }
        );

        let estimate = estimator::estimate(
            &profile,
            enrichment.weather.as_option(),
            enrichment.crypto.as_option(),
        )?;
        tracing::info!(
            "Final calculation - Coverage: {}, Premium: {}, adjustments: {:?}",
            estimate.coverage,
            estimate.monthly_premium,
            estimate.adjustments
        );

        let weather_info = enrichment
            .weather
            .as_option()
            .map(WeatherInfo::from_payload);
        let market_info = enrichment.crypto.as_option().map(MarketInfo::from_payload);

        let age = stored_count(profile.age, "age")?;
        let dependents = stored_count(profile.dependents, "dependents")?;
        self.persist(CoverageRequestRecord {
            id: request_id,
            name: profile.name,
            age,
            city: profile.city,
            annual_income: profile.annual_income,
            dependents,
            recommended_coverage: estimate.coverage,
            monthly_premium: estimate.monthly_premium,
            weather_data: enrichment.weather.into_option(),
            crypto_data: enrichment.crypto.into_option(),
            created_at: Utc::now(),
        });

        Ok(CoverageQuote {
            coverage: estimate.coverage,
            monthly_premium: estimate.monthly_premium,
            reasoning: estimate.reasoning,
            weather_info,
            market_info,
        })
    }

    /// Best-effort write of the submission; the response never waits on it.
    fn persist(&self, record: CoverageRequestRecord) {
        let store = self.store.clone();
        tokio::spawn(async move {
            match store.insert_coverage_request(&record).await {
                Ok(()) => tracing::info!("✓ Coverage request saved with ID: {}", record.id),
                Err(e) => tracing::error!("Failed to save coverage request {}: {}", record.id, e),
            }
        });
    }
}

/// Validation already bounds these to the column range.
fn stored_count(n: u32, field: &str) -> Result<i32, AppError> {
    i32::try_from(n).map_err(|_| AppError::InternalError(format!("{} out of range: {}", field, n)))
}
