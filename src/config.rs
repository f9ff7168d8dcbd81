//! Configuration management

use std::time::Duration;

use crate::error::Error;
use crate::services::coordinator::BatchConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,

    /// HTTP listen address
    pub bind_addr: String,

    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,

    /// Geocoder backend: "nominatim" or "mock"
    pub geocoder_backend: String,

    /// Batch pipeline tuning
    pub batch: BatchConfig,
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Error> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL must be set".to_string()))?;

        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8700".to_string());

        let nominatim_url = std::env::var("NOMINATIM_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());

        let geocoder_backend = std::env::var("GEOCODER_BACKEND")
            .unwrap_or_else(|_| "nominatim".to_string());

        let defaults = BatchConfig::default();
        let batch = BatchConfig {
            page_size: env_parsed("GEOCODE_PAGE_SIZE", defaults.page_size),
            api_delay: Duration::from_millis(env_parsed(
                "GEOCODE_API_DELAY_MS",
                defaults.api_delay.as_millis() as u64,
            )),
            time_budget: Duration::from_millis(env_parsed(
                "GEOCODE_TIME_BUDGET_MS",
                defaults.time_budget.as_millis() as u64,
            )),
            stale_threshold: Duration::from_secs(env_parsed(
                "GEOCODE_STALE_SECS",
                defaults.stale_threshold.as_secs(),
            )),
            catch_up_cap: env_parsed("GEOCODE_CATCH_UP_CAP", defaults.catch_up_cap),
        };

        if batch.page_size <= 0 {
            return Err(Error::Config(
                "GEOCODE_PAGE_SIZE must be a positive integer".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            bind_addr,
            nominatim_url,
            geocoder_backend,
            batch,
        })
    }
}
