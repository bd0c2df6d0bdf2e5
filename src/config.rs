use serde::Deserialize;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/coverage";
pub const DEFAULT_WEATHER_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_CRYPTO_API_URL: &str = "https://api.coindesk.com/v1/bpi/currentprice.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    /// Whether `database_url` came from the environment rather than the default.
    pub database_url_configured: bool,
    pub port: u16,
    pub weather_api_key: Option<String>, // Lookup degrades to unavailable when absent
    pub weather_api_url: String,
    pub crypto_api_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let configured_db_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("DB_URL"))
            .ok()
            .filter(|s| !s.trim().is_empty());

        let database_url = configured_db_url
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        if !database_url.starts_with("postgresql://") && !database_url.starts_with("postgres://")
        {
            anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
        }

        let config = Self {
            database_url,
            database_url_configured: configured_db_url.is_some(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            weather_api_key: std::env::var("OPENWEATHER_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            weather_api_url: http_url_from_env("WEATHER_API_URL", DEFAULT_WEATHER_API_URL)?,
            crypto_api_url: http_url_from_env("CRYPTO_API_URL", DEFAULT_CRYPTO_API_URL)?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}", redact_database_url(&config.database_url));
        tracing::debug!("Weather API URL: {}", config.weather_api_url);
        tracing::debug!("Crypto API URL: {}", config.crypto_api_url);
        tracing::debug!("Server Port: {}", config.port);
        if config.weather_api_key.is_none() {
            tracing::warn!("OPENWEATHER_API_KEY not set, weather lookups will be unavailable");
        }

        Ok(config)
    }

    pub fn has_weather_key(&self) -> bool {
        self.weather_api_key.is_some()
    }
}

fn http_url_from_env(var: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(var)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    Ok(url)
}

/// Masks the user and password of a connection string so it can be logged or
/// reported. Strings that fail to parse are masked entirely.
pub fn redact_database_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.username().is_empty() && parsed.password().is_none() {
                return parsed.to_string();
            }
            let _ = parsed.set_username("***");
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
