//! Persistence port for cached provider results.
//!
//! One record per `(provider, spatial key)`; recompute replaces in place.
//! The TTL is captured at write time so configuration changes never
//! retroactively invalidate old entries. Expiry deletion is an out-of-band
//! purge job, not part of the read path.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::domain::geo::GeoPoint;

/// Closed set of cached enrichment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Road-length and facility-count metrics from the map-data service.
    RoadFacilityMetrics,
    /// Daily weather series from the climate archive.
    WeatherDaily,
}

impl Provider {
    /// Stable identifier used in logs and response payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoadFacilityMetrics => "road_facility_metrics",
            Self::WeatherDaily => "weather_daily",
        }
    }

    /// Coordinate quantisation exponent for this provider's cache keys.
    ///
    /// Road metrics are local, so keys are quantised to 1e-5 degrees (about
    /// a metre); weather varies over kilometres, so 1e-4 degrees suffices
    /// and improves hit rates.
    pub fn coord_precision(self) -> u8 {
        match self {
            Self::RoadFacilityMetrics => 5,
            Self::WeatherDaily => 4,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point quantised onto a fixed decimal grid.
///
/// Quantisation makes repeated requests at the same logical location hit the
/// same cache entry regardless of float noise in the inputs. Coordinates are
/// stored as scaled integers so equality and hashing are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantisedPoint {
    /// Latitude times `10^precision`, rounded to nearest.
    pub lat_scaled: i64,
    /// Longitude times `10^precision`, rounded to nearest.
    pub lon_scaled: i64,
    /// Decimal places preserved by the grid.
    pub precision: u8,
}

impl QuantisedPoint {
    /// Snap `point` onto the grid with `precision` decimal places.
    pub fn quantise(point: GeoPoint, precision: u8) -> Self {
        let scale = 10f64.powi(i32::from(precision));
        Self {
            lat_scaled: (point.lat * scale).round() as i64,
            lon_scaled: (point.lon * scale).round() as i64,
            precision,
        }
    }

    /// Latitude recovered from the grid.
    pub fn lat(&self) -> f64 {
        self.lat_scaled as f64 / 10f64.powi(i32::from(self.precision))
    }

    /// Longitude recovered from the grid.
    pub fn lon(&self) -> f64 {
        self.lon_scaled as f64 / 10f64.powi(i32::from(self.precision))
    }
}

impl std::fmt::Display for QuantisedPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let places = usize::from(self.precision);
        write!(f, "{:.places$}:{:.places$}", self.lat(), self.lon())
    }
}

/// Deterministic cache key for one provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialKey {
    /// Point-plus-radius request (road/facility metrics).
    PointRadius {
        /// Quantised request location.
        point: QuantisedPoint,
        /// Search radius in metres.
        radius_m: u32,
    },
    /// Point-plus-date-range request (weather series).
    PointDateRange {
        /// Quantised request location.
        point: QuantisedPoint,
        /// First day of the series, inclusive.
        start: NaiveDate,
        /// Last day of the series, inclusive.
        end: NaiveDate,
    },
}

impl SpatialKey {
    /// Encode the key into its persistent primary-key form.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::geo::GeoPoint;
    /// use backend::domain::ports::{QuantisedPoint, SpatialKey};
    ///
    /// let point = GeoPoint::new(42.6977, 23.3219).expect("valid point");
    /// let key = SpatialKey::PointRadius {
    ///     point: QuantisedPoint::quantise(point, 5),
    ///     radius_m: 300,
    /// };
    /// assert_eq!(key.encode(), "42.69770:23.32190:300");
    /// ```
    pub fn encode(&self) -> String {
        match self {
            Self::PointRadius { point, radius_m } => format!("{point}:{radius_m}"),
            Self::PointDateRange { point, start, end } => format!("{point}:{start}:{end}"),
        }
    }
}

impl std::fmt::Display for SpatialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// One persisted cache row.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    /// Provider that produced the payload.
    pub provider: Provider,
    /// Deterministic spatial key; unique per provider.
    pub key: SpatialKey,
    /// Sanitised JSON-safe payload. Never contains non-finite numbers; the
    /// cache sanitises before every write.
    pub payload: Value,
    /// Timestamp of the write that produced this payload.
    pub computed_at: DateTime<Utc>,
    /// TTL in days, resolved from configuration at write time.
    pub ttl_days: u32,
}

/// Errors surfaced by the cache persistence adapter.
///
/// The cache treats these as recoverable: a failed read is a miss, a failed
/// write is logged and the computed payload still flows to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentStoreError {
    /// Pool checkout or connectivity failures.
    #[error("enrichment store connection failed: {message}")]
    Connection {
        /// Adapter-provided failure description.
        message: String,
    },
    /// Query execution failures.
    #[error("enrichment store query failed: {message}")]
    Query {
        /// Adapter-provided failure description.
        message: String,
    },
}

impl EnrichmentStoreError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Persistence port backing the enrichment cache.
#[async_trait]
pub trait EnrichmentStore: Send + Sync {
    /// Load the record for `(provider, key)`, if any.
    async fn get(
        &self,
        provider: Provider,
        key: &SpatialKey,
    ) -> Result<Option<CacheRecord>, EnrichmentStoreError>;

    /// Insert or replace the record keyed by `(provider, key)`.
    async fn upsert(&self, record: &CacheRecord) -> Result<(), EnrichmentStoreError>;
}
