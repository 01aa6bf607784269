//! Reqwest-backed Open-Meteo archive adapter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::dto::{ArchiveResponseDto, DAILY_VARIABLES};
use crate::domain::geo::GeoPoint;
use crate::domain::ports::{ProviderUnavailable, WeatherSource};

/// Open-Meteo adapter that performs GET requests against the archive
/// endpoint.
pub struct OpenMeteoHttpSource {
    client: Client,
    endpoint: Url,
}

impl OpenMeteoHttpSource {
    /// Build an adapter using a reqwest client with an explicit request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoHttpSource {
    async fn fetch_daily(
        &self,
        center: GeoPoint,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, ProviderUnavailable> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("latitude", center.lat.to_string()),
                ("longitude", center.lon.to_string()),
                ("start_date", start.to_string()),
                ("end_date", end.to_string()),
                ("daily", DAILY_VARIABLES.join(",")),
                ("timezone", "auto".to_owned()),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        debug!(bytes = body.len(), "open-meteo response received");

        let decoded: ArchiveResponseDto = serde_json::from_slice(body.as_ref()).map_err(|error| {
            ProviderUnavailable::decode(format!("invalid Open-Meteo JSON payload: {error}"))
        })?;
        Ok(decoded.into_payload())
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderUnavailable {
    if error.is_timeout() {
        ProviderUnavailable::timeout(error.to_string())
    } else {
        ProviderUnavailable::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> ProviderUnavailable {
    let preview = String::from_utf8_lossy(body)
        .chars()
        .take(160)
        .collect::<String>();
    let message = format!("status {}: {preview}", status.as_u16());
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderUnavailable::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderUnavailable::timeout(message)
        }
        _ => ProviderUnavailable::transport(message),
    }
}
