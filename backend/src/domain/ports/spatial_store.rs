//! Capability port over the spatial database.
//!
//! The store exposes exactly the operations the query service needs: bbox
//! containment, radius distance, optional simplification, and stable paging.
//! Results come back ordered by identity column ascending so `limit`/`offset`
//! paging is reproducible across calls on unchanged data.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::datasets::DatasetSchema;
use crate::domain::geo::{BBox, GeoPoint};

/// One feature row shaped by the store adapter.
///
/// `geometry` is the parsed GeoJSON geometry object (already simplified when
/// a tolerance was requested); `properties` is the sanitised JSONB payload
/// from the `props` column.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identity column value; result sets are ordered by it ascending.
    pub id: i64,
    /// Stable external source identifier, when the dataset carries one.
    pub source_id: Option<String>,
    /// Attribute payload from the `props` column.
    pub properties: Value,
    /// GeoJSON geometry object in WGS84 coordinates.
    pub geometry: Value,
}

/// Validated paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows to return; already clamped by the service.
    pub limit: u32,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Errors surfaced by the spatial store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpatialStoreError {
    /// Pool checkout or connectivity failures.
    #[error("spatial store connection failed: {message}")]
    Connection {
        /// Adapter-provided failure description.
        message: String,
    },
    /// Query construction or execution failures.
    #[error("spatial store query failed: {message}")]
    Query {
        /// Adapter-provided failure description.
        message: String,
    },
}

impl SpatialStoreError {
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

/// Read-only capability interface over the PostGIS-backed feature tables.
///
/// `simplify_m` of `None` disables simplification; otherwise geometries are
/// reduced to a tolerance in metres before serialisation. Simplification is
/// advisory: it never changes the geometry type and never moves a geometry
/// outside its original envelope by more than the tolerance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Fetch features whose geometry intersects `bbox`.
    async fn query_bbox(
        &self,
        schema: &DatasetSchema,
        bbox: BBox,
        page: Page,
        simplify_m: Option<f64>,
    ) -> Result<Vec<Feature>, SpatialStoreError>;

    /// Fetch features within `radius_m` metres of `center` (geodesic).
    async fn query_radius(
        &self,
        schema: &DatasetSchema,
        center: GeoPoint,
        radius_m: f64,
        page: Page,
        simplify_m: Option<f64>,
    ) -> Result<Vec<Feature>, SpatialStoreError>;

    /// Names of the datasets this store serves.
    ///
    /// The registry is static, so the default implementation answers without
    /// touching the database.
    fn list_datasets(&self) -> Vec<&'static str> {
        crate::domain::datasets::dataset_names()
    }
}
