//! Application configuration loaded via OrthoConfig.
//!
//! Every knob is overridable through `GEOSERVE_*` environment variables,
//! command-line flags, or a configuration file; only the database URL has no
//! default.

use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
const DEFAULT_OPENMETEO_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

/// Runtime configuration for the service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "GEOSERVE")]
pub struct AppConfig {
    /// Socket address to bind the HTTP server to.
    pub bind_addr: Option<String>,
    /// PostgreSQL connection URL; required.
    pub database_url: Option<String>,
    /// Maximum connections in the database pool.
    #[ortho_config(default = 10)]
    pub db_pool_max_size: u32,
    /// Overpass API endpoint.
    pub overpass_url: Option<String>,
    /// Open-Meteo archive endpoint.
    pub openmeteo_url: Option<String>,
    /// Upstream HTTP request timeout in seconds.
    #[ortho_config(default = 30)]
    pub http_timeout_seconds: u64,
    /// TTL in days for cached road/facility metrics.
    #[ortho_config(default = 30)]
    pub road_metrics_ttl_days: u32,
    /// TTL in days for cached weather series.
    #[ortho_config(default = 90)]
    pub weather_ttl_days: u32,
    /// Maximum accepted enrichment radius in metres.
    #[ortho_config(default = 1_000)]
    pub max_radius_m: u32,
    /// Maximum accepted weather range span in days.
    #[ortho_config(default = 366)]
    pub max_weather_span_days: u32,
    /// Server-wide cap on feature query limits.
    #[ortho_config(default = 20_000)]
    pub max_limit: u32,
    /// Feature limit applied when a query omits one.
    #[ortho_config(default = 5_000)]
    pub default_limit: u32,
}

impl AppConfig {
    /// Bind address, falling back to the default.
    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    /// Overpass endpoint, falling back to the public instance.
    pub fn overpass_url(&self) -> &str {
        self.overpass_url.as_deref().unwrap_or(DEFAULT_OVERPASS_URL)
    }

    /// Open-Meteo archive endpoint, falling back to the public instance.
    pub fn openmeteo_url(&self) -> &str {
        self.openmeteo_url.as_deref().unwrap_or(DEFAULT_OPENMETEO_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_config() -> AppConfig {
        AppConfig {
            bind_addr: None,
            database_url: None,
            db_pool_max_size: 10,
            overpass_url: None,
            openmeteo_url: None,
            http_timeout_seconds: 30,
            road_metrics_ttl_days: 30,
            weather_ttl_days: 90,
            max_radius_m: 1_000,
            max_weather_span_days: 366,
            max_limit: 20_000,
            default_limit: 5_000,
        }
    }

    #[test]
    fn fallbacks_cover_the_optional_endpoints() {
        let config = bare_config();
        assert_eq!(config.bind_addr(), DEFAULT_BIND_ADDR);
        assert_eq!(config.overpass_url(), DEFAULT_OVERPASS_URL);
        assert_eq!(config.openmeteo_url(), DEFAULT_OPENMETEO_URL);
    }

    #[test]
    fn explicit_values_win_over_fallbacks() {
        let mut config = bare_config();
        config.overpass_url = Some("https://overpass.internal/api".to_owned());
        assert_eq!(config.overpass_url(), "https://overpass.internal/api");
    }
}
