//! Capability ports for upstream enrichment data providers.
//!
//! The provider set is closed and known at compile time: road/facility
//! metrics from a map-data service and daily weather series from a climate
//! archive. Each connector owns its request shaping, timeout, and response
//! parsing; the shared error type lets the orchestrator distinguish
//! "provider down" from programming errors.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use crate::domain::geo::GeoPoint;

/// Typed condition for any upstream connector failure.
///
/// Transport, timeout, throttling, and decode failures are all recoverable
/// from the orchestrator's point of view: the affected response slot degrades
/// while the rest of the request proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderUnavailable {
    /// The upstream call exceeded its deadline.
    #[error("provider timed out: {message}")]
    Timeout {
        /// Connector-provided failure description.
        message: String,
    },
    /// Connection or protocol-level failure.
    #[error("provider transport failed: {message}")]
    Transport {
        /// Connector-provided failure description.
        message: String,
    },
    /// The upstream throttled the request.
    #[error("provider rate limited: {message}")]
    RateLimited {
        /// Connector-provided failure description.
        message: String,
    },
    /// The upstream answered with an unparseable payload.
    #[error("provider response could not be decoded: {message}")]
    Decode {
        /// Connector-provided failure description.
        message: String,
    },
}

impl ProviderUnavailable {
    /// Create a timeout error with the given message.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a transport error with the given message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a rate-limited error with the given message.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Create a decode error with the given message.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Source of aggregated road-length and facility-count metrics around a
/// point.
///
/// The upstream is not transactional, so repeated calls may legitimately
/// differ; the cache exists to bound call volume, not to pretend the source
/// is deterministic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoadMetricsSource: Send + Sync {
    /// Fetch metrics for ways and facilities within `radius_m` of `center`.
    ///
    /// The payload shape is
    /// `{ road_total_length_m, road_length_by_class_m, facility_counts, ... }`.
    async fn fetch(&self, center: GeoPoint, radius_m: u32) -> Result<Value, ProviderUnavailable>;
}

/// Source of daily weather series for a point and inclusive date range.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch the daily series covering `[start, end]`.
    ///
    /// Callers validate the range (ordering and span) before invoking this,
    /// so connectors never waste an upstream call on a rejectable request.
    async fn fetch_daily(
        &self,
        center: GeoPoint,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, ProviderUnavailable>;
}
