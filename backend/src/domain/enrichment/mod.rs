//! Combined point-enrichment orchestration.
//!
//! One request fans out into three independent sub-fetches — road/facility
//! metrics (cached), daily weather (cached, only when a date range is
//! supplied), and dataset geometries (never cached) — joined concurrently.
//! A provider failure degrades its own response slot; it never aborts the
//! other two. Input-shape errors are rejected before any I/O.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use utoipa::ToSchema;

use crate::domain::cache::EnrichmentCache;
use crate::domain::datasets::dataset_schema;
use crate::domain::error::Error;
use crate::domain::features::{FeatureCollectionDto, FeatureQuery, SpatialQueryService};
use crate::domain::geo::{BBox, GeoPoint, bbox_from_point_radius};
use crate::domain::ports::{
    Provider, ProviderUnavailable, QuantisedPoint, RoadMetricsSource, SpatialKey, WeatherSource,
};

/// How dataset geometries are selected for an enrichment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Query by the envelope derived from point + radius.
    BBox,
    /// Query by geodesic distance from the point.
    Radius,
    /// Query both ways; the response carries both collections.
    Both,
    /// Skip geometry queries entirely.
    None,
}

impl QueryMode {
    fn wants_bbox(self) -> bool {
        matches!(self, Self::BBox | Self::Both)
    }

    fn wants_radius(self) -> bool {
        matches!(self, Self::Radius | Self::Both)
    }
}

impl std::str::FromStr for QueryMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bbox" => Ok(Self::BBox),
            "radius" => Ok(Self::Radius),
            "both" => Ok(Self::Both),
            "none" => Ok(Self::None),
            other => Err(Error::invalid_request(format!(
                "mode must be one of bbox, radius, both, none; got {other}"
            ))),
        }
    }
}

/// Validated enrichment request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichRequest {
    /// Target location.
    pub point: GeoPoint,
    /// Search radius in metres around the point.
    pub radius_m: u32,
    /// Inclusive daily weather range; weather is skipped when absent.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Datasets to query geometries for; empty skips geometries.
    pub datasets: Vec<String>,
    /// Geometry selection mode.
    pub mode: QueryMode,
    /// Force recomputation of the cached providers. Has no effect on
    /// geometry queries, which are not cached.
    pub refresh: bool,
    /// Optional per-dataset feature limit; clamped server-side.
    pub limit: Option<i64>,
    /// Optional simplification tolerance in metres.
    pub simplify_m: Option<f64>,
}

/// One cached-provider response slot.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderSlot {
    /// The provider answered (from cache or a fresh compute).
    Available {
        /// True when the payload came from the cache.
        cached: bool,
        /// Sanitised provider payload.
        data: Value,
    },
    /// The provider could not be reached; the rest of the response stands.
    Unavailable {
        /// Human-readable failure description.
        error: String,
    },
}

impl ProviderSlot {
    fn from_cache(outcome: Result<crate::domain::cache::CacheOutcome, ProviderUnavailable>) -> Self {
        match outcome {
            Ok(outcome) => Self::Available {
                cached: outcome.was_cached,
                data: outcome.payload,
            },
            Err(error) => Self::Unavailable {
                error: error.to_string(),
            },
        }
    }
}

/// Geometry collections for one dataset, keyed by query mode.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DatasetGeometries {
    /// Envelope query result, when the mode includes bbox.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<FeatureCollectionDto>,
    /// Distance query result, when the mode includes radius.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<FeatureCollectionDto>,
}

/// Geometry response slot covering all requested datasets.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeatureSlot {
    /// All requested dataset queries succeeded.
    Available {
        /// Per-dataset collections, keyed by dataset name.
        datasets: BTreeMap<String, DatasetGeometries>,
    },
    /// The spatial store failed mid-request.
    Unavailable {
        /// Human-readable failure description.
        error: String,
    },
}

/// Transient aggregate returned for one enrichment request.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EnrichmentResult {
    /// Echo of the requested location.
    pub point: GeoPoint,
    /// Echo of the applied radius in metres.
    pub radius_m: u32,
    /// Envelope derived from point + radius.
    pub bbox: BBox,
    /// Road/facility metrics slot; always attempted.
    pub osm_metrics: ProviderSlot,
    /// Weather slot; present only when a date range was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_daily: Option<ProviderSlot>,
    /// Geometry slot; present only when datasets were requested and the
    /// mode is not `none`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometries: Option<FeatureSlot>,
}

/// Limits and TTLs the orchestrator resolves from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentPolicy {
    /// TTL in days for cached road/facility metrics.
    pub road_metrics_ttl_days: u32,
    /// TTL in days for cached weather series.
    pub weather_ttl_days: u32,
    /// Maximum accepted radius in metres.
    pub max_radius_m: u32,
    /// Maximum accepted weather range span in days (inclusive).
    pub max_weather_span_days: u32,
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self {
            road_metrics_ttl_days: 30,
            weather_ttl_days: 90,
            max_radius_m: 1_000,
            max_weather_span_days: 366,
        }
    }
}

/// Orchestrates the cache, connectors, and spatial query service into one
/// combined response.
pub struct EnrichmentService {
    cache: Arc<EnrichmentCache>,
    road_metrics: Arc<dyn RoadMetricsSource>,
    weather: Arc<dyn WeatherSource>,
    features: Arc<SpatialQueryService>,
    policy: EnrichmentPolicy,
}

impl EnrichmentService {
    /// Wire the orchestrator from its constructed dependencies.
    pub fn new(
        cache: Arc<EnrichmentCache>,
        road_metrics: Arc<dyn RoadMetricsSource>,
        weather: Arc<dyn WeatherSource>,
        features: Arc<SpatialQueryService>,
        policy: EnrichmentPolicy,
    ) -> Self {
        Self {
            cache,
            road_metrics,
            weather,
            features,
            policy,
        }
    }

    /// Enrich a point with provider metrics and dataset geometries.
    ///
    /// The three sub-fetches run concurrently and fail independently; only
    /// input-shape violations fail the whole request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::invalid_request`] or [`Error::unknown_dataset`] for
    /// parameter violations, always before any I/O.
    pub async fn enrich_point(&self, request: &EnrichRequest) -> Result<EnrichmentResult, Error> {
        self.validate(request)?;
        let bbox = bbox_from_point_radius(request.point, f64::from(request.radius_m))?;

        let (osm_metrics, weather_daily, geometries) = tokio::join!(
            self.fetch_road_metrics(request),
            self.fetch_weather(request),
            self.fetch_geometries(request, bbox),
        );

        if let ProviderSlot::Unavailable { error } = &osm_metrics {
            warn!(provider = %Provider::RoadFacilityMetrics, error, "enrichment slot degraded");
        }
        if let Some(ProviderSlot::Unavailable { error }) = &weather_daily {
            warn!(provider = %Provider::WeatherDaily, error, "enrichment slot degraded");
        }

        Ok(EnrichmentResult {
            point: request.point,
            radius_m: request.radius_m,
            bbox,
            osm_metrics,
            weather_daily,
            geometries,
        })
    }

    fn validate(&self, request: &EnrichRequest) -> Result<(), Error> {
        if request.radius_m == 0 || request.radius_m > self.policy.max_radius_m {
            return Err(Error::invalid_request(format!(
                "radius_m must be within [1, {}]",
                self.policy.max_radius_m
            )));
        }
        if let Some((start, end)) = request.date_range {
            if end < start {
                return Err(Error::invalid_request("end must not precede start"));
            }
            let span_days = end.signed_duration_since(start).num_days() + 1;
            if span_days > i64::from(self.policy.max_weather_span_days) {
                return Err(Error::invalid_request(format!(
                    "date range spans {span_days} days; maximum is {}",
                    self.policy.max_weather_span_days
                )));
            }
        }
        // Reject unknown datasets before any sub-fetch starts.
        for dataset in &request.datasets {
            dataset_schema(dataset)?;
        }
        Ok(())
    }

    async fn fetch_road_metrics(&self, request: &EnrichRequest) -> ProviderSlot {
        let provider = Provider::RoadFacilityMetrics;
        let key = SpatialKey::PointRadius {
            point: QuantisedPoint::quantise(request.point, provider.coord_precision()),
            radius_m: request.radius_m,
        };
        let source = self.road_metrics.clone();
        let point = request.point;
        let radius_m = request.radius_m;
        let outcome = self
            .cache
            .get_or_compute(
                provider,
                key,
                self.policy.road_metrics_ttl_days,
                request.refresh,
                move || async move { source.fetch(point, radius_m).await },
            )
            .await;
        ProviderSlot::from_cache(outcome)
    }

    async fn fetch_weather(&self, request: &EnrichRequest) -> Option<ProviderSlot> {
        let (start, end) = request.date_range?;
        let provider = Provider::WeatherDaily;
        let quantised = QuantisedPoint::quantise(request.point, provider.coord_precision());
        let key = SpatialKey::PointDateRange {
            point: quantised,
            start,
            end,
        };
        // Fetch at the quantised location so identical keys hit identical
        // upstream coordinates.
        let center = GeoPoint {
            lat: quantised.lat(),
            lon: quantised.lon(),
        };
        let source = self.weather.clone();
        let outcome = self
            .cache
            .get_or_compute(
                provider,
                key,
                self.policy.weather_ttl_days,
                request.refresh,
                move || async move { source.fetch_daily(center, start, end).await },
            )
            .await;
        Some(ProviderSlot::from_cache(outcome))
    }

    async fn fetch_geometries(&self, request: &EnrichRequest, bbox: BBox) -> Option<FeatureSlot> {
        if request.datasets.is_empty() || request.mode == QueryMode::None {
            return None;
        }

        let mut datasets = BTreeMap::new();
        for dataset in &request.datasets {
            let mut collections = DatasetGeometries {
                bbox: None,
                radius: None,
            };
            if request.mode.wants_bbox() {
                let mut query = self.base_query(dataset, request);
                query.bbox = Some(bbox);
                match self.features.list_features(&query).await {
                    Ok(collection) => collections.bbox = Some(collection),
                    Err(error) => return Some(unavailable_features(dataset, &error)),
                }
            }
            if request.mode.wants_radius() {
                let mut query = self.base_query(dataset, request);
                query.center = Some(request.point);
                query.radius_m = f64::from(request.radius_m);
                match self.features.list_features(&query).await {
                    Ok(collection) => collections.radius = Some(collection),
                    Err(error) => return Some(unavailable_features(dataset, &error)),
                }
            }
            datasets.insert(dataset.clone(), collections);
        }
        Some(FeatureSlot::Available { datasets })
    }

    fn base_query(&self, dataset: &str, request: &EnrichRequest) -> FeatureQuery {
        let mut query = FeatureQuery::for_dataset(dataset);
        query.limit = request.limit;
        query.simplify_m = request.simplify_m;
        query
    }
}

fn unavailable_features(dataset: &str, error: &Error) -> FeatureSlot {
    warn!(dataset, error = %error, "geometry slot degraded");
    FeatureSlot::Unavailable {
        error: format!("{dataset}: {}", error.message()),
    }
}

#[cfg(test)]
mod tests;
