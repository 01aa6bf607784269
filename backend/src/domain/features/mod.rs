//! Dataset-agnostic spatial feature queries.
//!
//! The service validates a [`FeatureQuery`] before any I/O, delegates to the
//! [`SpatialStore`] port for the matching query mode, and shapes rows into a
//! GeoJSON feature collection. An empty result is a valid outcome.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::datasets::{DatasetSchema, dataset_names, dataset_schema};
use crate::domain::error::Error;
use crate::domain::geo::{BBox, GeoPoint};
use crate::domain::ports::{Feature, Page, SpatialStore, SpatialStoreError};

/// Ephemeral query parameters for one feature request.
///
/// Exactly one of `bbox` and `center` must be set; the service rejects
/// both-set and neither-set before touching the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureQuery {
    /// Dataset name, validated against the registry.
    pub dataset: String,
    /// Axis-aligned bounding box selector.
    pub bbox: Option<BBox>,
    /// Radius selector centre point.
    pub center: Option<GeoPoint>,
    /// Radius in metres; only meaningful with `center`.
    pub radius_m: f64,
    /// Requested row limit; clamped server-side.
    pub limit: Option<i64>,
    /// Rows to skip; negative values are rejected.
    pub offset: i64,
    /// Optional simplification tolerance in metres.
    pub simplify_m: Option<f64>,
}

impl FeatureQuery {
    /// Default search radius in metres when a radius query omits one.
    pub const DEFAULT_RADIUS_M: f64 = 300.0;

    /// Convenience constructor with unset selectors and defaults.
    pub fn for_dataset(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            bbox: None,
            center: None,
            radius_m: Self::DEFAULT_RADIUS_M,
            limit: None,
            offset: 0,
            simplify_m: None,
        }
    }
}

/// One GeoJSON feature in a response collection.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FeatureDto {
    /// Always the literal `"Feature"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Identity column value.
    pub id: i64,
    /// GeoJSON geometry object in WGS84 coordinates.
    pub geometry: Value,
    /// Sanitised attribute payload; includes `source_id` when present.
    pub properties: Value,
}

/// GeoJSON feature collection response.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FeatureCollectionDto {
    /// Always the literal `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Features ordered by identity column ascending.
    pub features: Vec<FeatureDto>,
    /// Coordinate reference system tag (always EPSG:4326).
    pub crs: Value,
}

impl FeatureCollectionDto {
    fn new(features: Vec<FeatureDto>) -> Self {
        Self {
            kind: "FeatureCollection",
            features,
            crs: serde_json::json!({
                "type": "name",
                "properties": { "name": "EPSG:4326" },
            }),
        }
    }
}

/// Validated spatial query service over the store port.
pub struct SpatialQueryService {
    store: Arc<dyn SpatialStore>,
    max_limit: u32,
    default_limit: u32,
}

impl SpatialQueryService {
    /// Build a service with the server-wide limit policy.
    ///
    /// `default_limit` applies when a query omits `limit`; both values are
    /// themselves capped per dataset by the registry.
    pub fn new(store: Arc<dyn SpatialStore>, max_limit: u32, default_limit: u32) -> Self {
        Self {
            store,
            max_limit,
            default_limit: default_limit.min(max_limit),
        }
    }

    /// Names of the served datasets.
    pub fn list_datasets(&self) -> Vec<&'static str> {
        dataset_names()
    }

    /// Execute a validated feature query and shape the result.
    ///
    /// # Errors
    ///
    /// - [`Error::unknown_dataset`] for names outside the registry.
    /// - [`Error::invalid_request`] for selector or paging violations.
    /// - [`Error::internal`] when the store fails.
    pub async fn list_features(&self, query: &FeatureQuery) -> Result<FeatureCollectionDto, Error> {
        let schema = dataset_schema(&query.dataset)?;
        let page = self.validated_page(schema, query)?;
        let simplify_m = effective_simplify(schema, query.simplify_m);

        let rows = match (query.bbox, query.center) {
            (Some(bbox), None) => self.store.query_bbox(schema, bbox, page, simplify_m).await,
            (None, Some(center)) => {
                if !query.radius_m.is_finite() || query.radius_m <= 0.0 {
                    return Err(Error::invalid_request("radius_m must be positive"));
                }
                self.store
                    .query_radius(schema, center, query.radius_m, page, simplify_m)
                    .await
            }
            (Some(_), Some(_)) => {
                return Err(Error::invalid_request(
                    "bbox and lat/lon are mutually exclusive",
                ));
            }
            (None, None) => {
                return Err(Error::invalid_request(
                    "provide either bbox=minx,miny,maxx,maxy or lat and lon",
                ));
            }
        };

        let rows = rows.map_err(map_store_error)?;
        debug!(
            dataset = schema.name,
            rows = rows.len(),
            limit = page.limit,
            offset = page.offset,
            "feature query served"
        );
        Ok(FeatureCollectionDto::new(
            rows.into_iter().map(into_feature_dto).collect(),
        ))
    }

    fn validated_page(&self, schema: &DatasetSchema, query: &FeatureQuery) -> Result<Page, Error> {
        if query.offset < 0 {
            return Err(Error::invalid_request("offset must not be negative"));
        }
        let offset = u32::try_from(query.offset)
            .map_err(|_| Error::invalid_request("offset is too large"))?;

        let requested = match query.limit {
            None => self.default_limit,
            // Clamp instead of rejecting: the server-side maximum always
            // wins regardless of what the client asked for.
            Some(limit) => u32::try_from(limit.max(1)).unwrap_or(u32::MAX),
        };
        let limit = requested.min(self.max_limit).min(schema.max_features).max(1);

        Ok(Page { limit, offset })
    }
}

/// Forward the tolerance only where simplification is meaningful; for point
/// datasets it is a silent no-op, not an error.
fn effective_simplify(schema: &DatasetSchema, simplify_m: Option<f64>) -> Option<f64> {
    match simplify_m {
        Some(tolerance)
            if tolerance.is_finite()
                && tolerance > 0.0
                && schema.geometry.supports_simplification() =>
        {
            Some(tolerance)
        }
        _ => None,
    }
}

fn into_feature_dto(row: Feature) -> FeatureDto {
    let mut properties = row.properties;
    if let Some(source_id) = row.source_id
        && let Value::Object(entries) = &mut properties
    {
        entries.insert("source_id".to_owned(), Value::String(source_id));
    }
    FeatureDto {
        kind: "Feature",
        id: row.id,
        geometry: row.geometry,
        properties,
    }
}

fn map_store_error(error: SpatialStoreError) -> Error {
    Error::internal(format!("spatial store failed: {error}"))
}
