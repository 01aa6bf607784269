//! Static registry of served municipal datasets.
//!
//! Each dataset maps to one PostGIS table with the uniform column shape
//! `(id, source_id?, props jsonb, geom)`. The registry is fixed at compile
//! time; request handling only ever reads it.

use serde::Serialize;
use utoipa::ToSchema;

use super::error::Error;

/// Broad geometry family stored in a dataset's `geom` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    /// Point geometries (trees, POIs).
    Point,
    /// Line geometries (streets, pedestrian network).
    Line,
    /// Polygon geometries (buildings, green areas, neighbourhoods).
    Polygon,
}

impl GeometryKind {
    /// Whether geometry simplification is meaningful for this family.
    /// Simplifying a point is a no-op, not an error.
    pub fn supports_simplification(self) -> bool {
        !matches!(self, Self::Point)
    }
}

/// Schema of one served dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSchema {
    /// Public dataset name used in request paths.
    pub name: &'static str,
    /// Backing table name; identity column `id` orders paged results.
    pub table: &'static str,
    /// Geometry family of the `geom` column.
    pub geometry: GeometryKind,
    /// Whether the table carries a stable external `source_id` column.
    pub has_source_id: bool,
    /// Per-dataset result cap, applied on top of the server-wide limit.
    pub max_features: u32,
}

const DATASETS: &[DatasetSchema] = &[
    DatasetSchema {
        name: "buildings",
        table: "buildings",
        geometry: GeometryKind::Polygon,
        has_source_id: true,
        max_features: 10_000,
    },
    DatasetSchema {
        name: "green_areas",
        table: "green_areas",
        geometry: GeometryKind::Polygon,
        has_source_id: true,
        max_features: 20_000,
    },
    DatasetSchema {
        // Administrative boundaries are municipal data, not OSM-derived, so
        // there is no stable external identifier.
        name: "neighbourhoods",
        table: "neighbourhoods",
        geometry: GeometryKind::Polygon,
        has_source_id: false,
        max_features: 20_000,
    },
    DatasetSchema {
        name: "streets",
        table: "streets",
        geometry: GeometryKind::Line,
        has_source_id: true,
        max_features: 20_000,
    },
    DatasetSchema {
        name: "pedestrian_network",
        table: "pedestrian_network",
        geometry: GeometryKind::Line,
        has_source_id: true,
        max_features: 20_000,
    },
    DatasetSchema {
        name: "trees",
        table: "trees",
        geometry: GeometryKind::Point,
        has_source_id: true,
        max_features: 10_000,
    },
    DatasetSchema {
        name: "pois",
        table: "pois",
        geometry: GeometryKind::Point,
        has_source_id: true,
        max_features: 20_000,
    },
];

/// Look up a dataset schema by its public name.
///
/// # Errors
///
/// Returns [`Error::unknown_dataset`] for names outside the registry; an
/// unknown dataset is an input error, not a lookup miss.
pub fn dataset_schema(name: &str) -> Result<&'static DatasetSchema, Error> {
    DATASETS
        .iter()
        .find(|schema| schema.name == name)
        .ok_or_else(|| Error::unknown_dataset(format!("unknown dataset: {name}")))
}

/// All dataset names served by this instance, sorted.
pub fn dataset_names() -> Vec<&'static str> {
    let mut names: Vec<_> = DATASETS.iter().map(|schema| schema.name).collect();
    names.sort_unstable();
    names
}
