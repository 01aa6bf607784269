//! PostGIS-backed spatial store adapter.
//!
//! Dataset tables are queried through raw SQL because their geometry columns
//! only make sense through PostGIS functions: `ST_Intersects` over an
//! envelope for bbox queries, `ST_DWithin` over geography for radius queries,
//! and `ST_AsGeoJSON` for the response shape. Table names are interpolated
//! from the static dataset registry, never from request input.

use async_trait::async_trait;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Double, Nullable};
use diesel_async::RunQueryDsl;
use serde_json::Value;

use crate::domain::datasets::DatasetSchema;
use crate::domain::geo::{BBox, GeoPoint};
use crate::domain::ports::{Feature, Page, SpatialStore, SpatialStoreError};

use super::diesel_helpers::{map_diesel_error_message, map_pool_error_message};
use super::pool::{DbPool, PoolError};

/// Diesel-backed implementation of the spatial store port.
#[derive(Clone)]
pub struct PostgisSpatialStore {
    pool: DbPool,
}

impl PostgisSpatialStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, diesel::QueryableByName)]
struct FeatureRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Nullable<diesel::sql_types::Text>)]
    source_id: Option<String>,
    #[diesel(sql_type = Nullable<diesel::sql_types::Jsonb>)]
    properties: Option<Value>,
    #[diesel(sql_type = Nullable<diesel::sql_types::Text>)]
    geometry: Option<String>,
}

fn map_pool_error(error: PoolError) -> SpatialStoreError {
    SpatialStoreError::connection(map_pool_error_message(error))
}

fn map_diesel_error(operation: &str) -> impl FnOnce(diesel::result::Error) -> SpatialStoreError + '_ {
    move |error| SpatialStoreError::query(map_diesel_error_message(error, operation))
}

/// GeoJSON output expression, optionally simplified in web-mercator metres.
///
/// `tolerance_bind` is the 1-based placeholder index of the tolerance when
/// simplification applies.
fn geometry_expr(simplify: bool, tolerance_bind: u8) -> String {
    if simplify {
        format!(
            "ST_AsGeoJSON(ST_Transform(ST_SimplifyPreserveTopology(\
             ST_Transform(geom, 3857), ${tolerance_bind}), 4326))"
        )
    } else {
        "ST_AsGeoJSON(geom)".to_owned()
    }
}

fn source_id_expr(schema: &DatasetSchema) -> &'static str {
    if schema.has_source_id {
        "source_id"
    } else {
        "NULL::text AS source_id"
    }
}

fn build_bbox_sql(schema: &DatasetSchema, simplify: bool) -> String {
    // With simplification the tolerance takes $1 and shifts the rest.
    let offset = u8::from(simplify);
    format!(
        "SELECT id, {source_id}, props AS properties, {geometry} AS geometry \
         FROM {table} \
         WHERE ST_Intersects(geom, ST_MakeEnvelope(${p1}, ${p2}, ${p3}, ${p4}, 4326)) \
         ORDER BY id \
         LIMIT ${p5} OFFSET ${p6}",
        source_id = source_id_expr(schema),
        geometry = geometry_expr(simplify, 1),
        table = schema.table,
        p1 = offset + 1,
        p2 = offset + 2,
        p3 = offset + 3,
        p4 = offset + 4,
        p5 = offset + 5,
        p6 = offset + 6,
    )
}

fn build_radius_sql(schema: &DatasetSchema, simplify: bool) -> String {
    let offset = u8::from(simplify);
    format!(
        "SELECT id, {source_id}, props AS properties, {geometry} AS geometry \
         FROM {table} \
         WHERE ST_DWithin(geom::geography, \
         ST_SetSRID(ST_MakePoint(${p1}, ${p2}), 4326)::geography, ${p3}) \
         ORDER BY id \
         LIMIT ${p4} OFFSET ${p5}",
        source_id = source_id_expr(schema),
        geometry = geometry_expr(simplify, 1),
        table = schema.table,
        p1 = offset + 1,
        p2 = offset + 2,
        p3 = offset + 3,
        p4 = offset + 4,
        p5 = offset + 5,
    )
}

fn into_feature(row: FeatureRow) -> Result<Feature, SpatialStoreError> {
    let geometry = match row.geometry {
        Some(raw) => serde_json::from_str(&raw).map_err(|error| {
            SpatialStoreError::query(format!("row {} has invalid GeoJSON: {error}", row.id))
        })?,
        None => Value::Null,
    };
    Ok(Feature {
        id: row.id,
        source_id: row.source_id,
        properties: row.properties.unwrap_or_else(|| Value::Object(Default::default())),
        geometry,
    })
}

fn collect_features(rows: Vec<FeatureRow>) -> Result<Vec<Feature>, SpatialStoreError> {
    rows.into_iter().map(into_feature).collect()
}

#[async_trait]
impl SpatialStore for PostgisSpatialStore {
    async fn query_bbox(
        &self,
        schema: &DatasetSchema,
        bbox: BBox,
        page: Page,
        simplify_m: Option<f64>,
    ) -> Result<Vec<Feature>, SpatialStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let sql = build_bbox_sql(schema, simplify_m.is_some());

        let rows: Vec<FeatureRow> = if let Some(tolerance) = simplify_m {
            sql_query(sql)
                .bind::<Double, _>(tolerance)
                .bind::<Double, _>(bbox.min_x)
                .bind::<Double, _>(bbox.min_y)
                .bind::<Double, _>(bbox.max_x)
                .bind::<Double, _>(bbox.max_y)
                .bind::<BigInt, _>(i64::from(page.limit))
                .bind::<BigInt, _>(i64::from(page.offset))
                .load(&mut conn)
                .await
        } else {
            sql_query(sql)
                .bind::<Double, _>(bbox.min_x)
                .bind::<Double, _>(bbox.min_y)
                .bind::<Double, _>(bbox.max_x)
                .bind::<Double, _>(bbox.max_y)
                .bind::<BigInt, _>(i64::from(page.limit))
                .bind::<BigInt, _>(i64::from(page.offset))
                .load(&mut conn)
                .await
        }
        .map_err(map_diesel_error(schema.name))?;

        collect_features(rows)
    }

    async fn query_radius(
        &self,
        schema: &DatasetSchema,
        center: GeoPoint,
        radius_m: f64,
        page: Page,
        simplify_m: Option<f64>,
    ) -> Result<Vec<Feature>, SpatialStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let sql = build_radius_sql(schema, simplify_m.is_some());

        let rows: Vec<FeatureRow> = if let Some(tolerance) = simplify_m {
            sql_query(sql)
                .bind::<Double, _>(tolerance)
                .bind::<Double, _>(center.lon)
                .bind::<Double, _>(center.lat)
                .bind::<Double, _>(radius_m)
                .bind::<BigInt, _>(i64::from(page.limit))
                .bind::<BigInt, _>(i64::from(page.offset))
                .load(&mut conn)
                .await
        } else {
            sql_query(sql)
                .bind::<Double, _>(center.lon)
                .bind::<Double, _>(center.lat)
                .bind::<Double, _>(radius_m)
                .bind::<BigInt, _>(i64::from(page.limit))
                .bind::<BigInt, _>(i64::from(page.offset))
                .load(&mut conn)
                .await
        }
        .map_err(map_diesel_error(schema.name))?;

        collect_features(rows)
    }
}

#[cfg(test)]
mod tests {
    //! SQL construction and row mapping coverage; network paths are covered
    //! by the service-level tests against a mocked port.

    use serde_json::json;

    use super::*;
    use crate::domain::datasets::dataset_schema;

    #[test]
    fn bbox_sql_orders_and_pages() {
        let schema = dataset_schema("streets").expect("streets exists");
        let sql = build_bbox_sql(schema, false);
        assert!(sql.contains("FROM streets"));
        assert!(sql.contains("props AS properties"));
        assert!(sql.contains("ST_MakeEnvelope($1, $2, $3, $4, 4326)"));
        assert!(sql.contains("ORDER BY id"));
        assert!(sql.ends_with("LIMIT $5 OFFSET $6"));
        assert!(sql.contains("ST_AsGeoJSON(geom)"));
    }

    #[test]
    fn simplification_shifts_the_bind_positions() {
        let schema = dataset_schema("streets").expect("streets exists");
        let sql = build_bbox_sql(schema, true);
        assert!(sql.contains("ST_SimplifyPreserveTopology"));
        assert!(sql.contains("ST_Transform(geom, 3857), $1"));
        assert!(sql.contains("ST_MakeEnvelope($2, $3, $4, $5, 4326)"));
        assert!(sql.ends_with("LIMIT $6 OFFSET $7"));
    }

    #[test]
    fn radius_sql_uses_geography_distance() {
        let schema = dataset_schema("trees").expect("trees exists");
        let sql = build_radius_sql(schema, false);
        assert!(sql.contains("ST_DWithin(geom::geography"));
        assert!(sql.contains("ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3"));
        assert!(sql.ends_with("LIMIT $4 OFFSET $5"));
    }

    #[test]
    fn datasets_without_source_ids_select_null() {
        let schema = dataset_schema("neighbourhoods").expect("neighbourhoods exists");
        let sql = build_bbox_sql(schema, false);
        assert!(sql.contains("NULL::text AS source_id"));
    }

    #[test]
    fn rows_map_into_features() {
        let row = FeatureRow {
            id: 7,
            source_id: Some("osm-7".to_owned()),
            properties: Some(json!({ "name": "boulevard" })),
            geometry: Some(r#"{"type":"Point","coordinates":[23.32,42.69]}"#.to_owned()),
        };
        let feature = into_feature(row).expect("row maps");
        assert_eq!(feature.id, 7);
        assert_eq!(feature.geometry["type"], "Point");
        assert_eq!(feature.properties["name"], "boulevard");
    }

    #[test]
    fn invalid_geojson_maps_to_a_query_error() {
        let row = FeatureRow {
            id: 8,
            source_id: None,
            properties: None,
            geometry: Some("not json".to_owned()),
        };
        assert!(into_feature(row).is_err());
    }
}
