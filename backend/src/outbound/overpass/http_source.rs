//! Reqwest-backed Overpass metrics adapter.
//!
//! This adapter owns transport details only: query construction, timeout and
//! HTTP error mapping, retry with jittered backoff, and JSON decoding. The
//! aggregated payload shape lives in the sibling `metrics` module.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::dto::OverpassResponseDto;
use super::metrics::metrics_payload;
use crate::domain::geo::GeoPoint;
use crate::domain::ports::{ProviderUnavailable, RoadMetricsSource};

const DEFAULT_QUERY_TIMEOUT_SECONDS: u32 = 25;
const DEFAULT_USER_AGENT: &str = "geoserve-backend-overpass/0.1";
const DEFAULT_CONTACT: &str = "ops@geoserve.invalid";

/// Outbound identity and query timeout settings for Overpass requests.
pub struct OverpassHttpIdentity {
    /// HTTP user-agent sent to Overpass.
    pub user_agent: String,
    /// Contact header value sent to Overpass.
    pub contact: String,
    /// Timeout directive embedded in Overpass query text.
    pub query_timeout_seconds: u32,
}

impl Default for OverpassHttpIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            contact: DEFAULT_CONTACT.to_owned(),
            query_timeout_seconds: DEFAULT_QUERY_TIMEOUT_SECONDS,
        }
    }
}

/// Retry settings for transient upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay, before jitter.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    fn backoff_for(self, attempt: u32) -> Duration {
        let doubled = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        jittered_delay(doubled.min(self.max_backoff), attempt)
    }
}

/// Deterministic jitter derived from the clock's sub-second component, up to
/// a quarter of the base delay.
fn jittered_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let max_extra = (base_ms / 4).max(1);
    let seed = u64::from(Utc::now().timestamp_subsec_nanos()) ^ u64::from(attempt);
    let extra = seed % (max_extra.saturating_add(1));
    Duration::from_millis(base_ms.saturating_add(extra))
}

/// Overpass adapter that performs HTTP POST requests against one endpoint.
pub struct OverpassHttpSource {
    client: Client,
    endpoint: Url,
    identity: OverpassHttpIdentity,
    retry: RetryPolicy,
}

impl OverpassHttpSource {
    /// Build an adapter using a reqwest client with an explicit request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_identity(
            endpoint,
            timeout,
            OverpassHttpIdentity::default(),
            RetryPolicy::default(),
        )
    }

    /// Build an adapter with explicit outbound identity and retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_identity(
        endpoint: Url,
        timeout: Duration,
        identity: OverpassHttpIdentity,
        retry: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            identity,
            retry,
        })
    }

    async fn execute(&self, query: String) -> Result<OverpassResponseDto, ProviderUnavailable> {
        let mut attempt = 0;
        loop {
            match self.execute_once(query.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts.max(1) || !is_retryable(&error) {
                        return Err(error);
                    }
                    let delay = self.retry.backoff_for(attempt - 1);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "overpass request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn execute_once(&self, query: String) -> Result<OverpassResponseDto, ProviderUnavailable> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::USER_AGENT, self.identity.user_agent.as_str())
            .header("Contact", self.identity.contact.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("data", query)])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        debug!(bytes = body.len(), "overpass response received");
        serde_json::from_slice(body.as_ref()).map_err(|error| {
            ProviderUnavailable::decode(format!("invalid Overpass JSON payload: {error}"))
        })
    }
}

#[async_trait]
impl RoadMetricsSource for OverpassHttpSource {
    async fn fetch(&self, center: GeoPoint, radius_m: u32) -> Result<Value, ProviderUnavailable> {
        let timeout = self.identity.query_timeout_seconds.max(1);
        let roads = self
            .execute(build_roads_query(center, radius_m, timeout))
            .await?;
        let facilities = self
            .execute(build_facilities_query(center, radius_m, timeout))
            .await?;
        Ok(metrics_payload(
            center,
            radius_m,
            &roads.elements,
            &facilities.elements,
        ))
    }
}

fn build_roads_query(center: GeoPoint, radius_m: u32, timeout_seconds: u32) -> String {
    format!(
        "[out:json][timeout:{timeout_seconds}];\n\
         way[\"highway\"](around:{radius_m},{lat},{lon});\n\
         out tags geom;",
        lat = center.lat,
        lon = center.lon,
    )
}

fn build_facilities_query(center: GeoPoint, radius_m: u32, timeout_seconds: u32) -> String {
    let around = format!("(around:{radius_m},{lat},{lon})", lat = center.lat, lon = center.lon);
    let selectors = [
        format!("  nwr[\"amenity\"]{around};"),
        format!("  nwr[\"shop\"]{around};"),
        format!("  nwr[\"leisure\"]{around};"),
        format!("  nwr[\"tourism\"]{around};"),
        format!("  nwr[\"public_transport\"]{around};"),
        format!("  nwr[\"highway\"=\"bus_stop\"]{around};"),
        format!("  nwr[\"railway\"~\"^(station|halt|tram_stop)$\"]{around};"),
    ];
    format!(
        "[out:json][timeout:{timeout_seconds}];\n(\n{}\n);\nout tags;",
        selectors.join("\n")
    )
}

fn is_retryable(error: &ProviderUnavailable) -> bool {
    matches!(
        error,
        ProviderUnavailable::Timeout { .. }
            | ProviderUnavailable::Transport { .. }
            | ProviderUnavailable::RateLimited { .. }
    )
}

fn map_transport_error(error: reqwest::Error) -> ProviderUnavailable {
    if error.is_timeout() {
        ProviderUnavailable::timeout(error.to_string())
    } else {
        ProviderUnavailable::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> ProviderUnavailable {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderUnavailable::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderUnavailable::timeout(message)
        }
        _ => ProviderUnavailable::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network Overpass mapping helpers.

    use super::*;
    use rstest::rstest;

    fn sofia() -> GeoPoint {
        GeoPoint::new(42.6977, 23.3219).expect("valid point")
    }

    #[test]
    fn roads_query_asks_for_way_geometry() {
        let query = build_roads_query(sofia(), 300, 25);
        assert!(query.starts_with("[out:json][timeout:25];"));
        assert!(query.contains("way[\"highway\"](around:300,42.6977,23.3219);"));
        assert!(query.ends_with("out tags geom;"));
    }

    #[test]
    fn facilities_query_covers_every_category() {
        let query = build_facilities_query(sofia(), 300, 25);
        for selector in ["amenity", "shop", "leisure", "tourism", "public_transport"] {
            assert!(
                query.contains(&format!("nwr[\"{selector}\"](around:300,")),
                "{selector} selector missing"
            );
        }
        assert!(query.contains("\"bus_stop\""));
        assert!(query.contains("station|halt|tram_stop"));
        assert!(query.ends_with("out tags;"), "counts need tags only");
    }

    #[rstest]
    #[case::rate_limited(StatusCode::TOO_MANY_REQUESTS)]
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT)]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT)]
    #[case::server_error(StatusCode::INTERNAL_SERVER_ERROR)]
    fn http_failures_are_retryable(#[case] status: StatusCode) {
        let error = map_status_error(status, b"{\"remark\":\"backend unavailable\"}");
        assert!(is_retryable(&error), "{status} should be retryable");
    }

    #[test]
    fn rate_limit_maps_to_its_own_variant() {
        let error = map_status_error(StatusCode::TOO_MANY_REQUESTS, b"slow down");
        assert!(matches!(error, ProviderUnavailable::RateLimited { .. }));
    }

    #[test]
    fn decode_failures_are_terminal() {
        assert!(!is_retryable(&ProviderUnavailable::decode("bad json")));
    }

    #[test]
    fn status_message_includes_a_bounded_body_preview() {
        let body = "x".repeat(400);
        let error = map_status_error(StatusCode::INTERNAL_SERVER_ERROR, body.as_bytes());
        let message = error.to_string();
        assert!(message.contains("status 500"));
        assert!(message.len() < 250, "preview must stay bounded");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
        };
        let first = policy.backoff_for(0);
        let third = policy.backoff_for(2);
        assert!(first >= Duration::from_millis(100));
        // Capped at 300 ms plus at most a quarter of jitter.
        assert!(third <= Duration::from_millis(375));
    }
}
