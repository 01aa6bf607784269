//! Dataset API handlers.
//!
//! ```text
//! GET /api/v1/datasets
//! GET /api/v1/datasets/{name}?bbox=minx,miny,maxx,maxy&limit=&offset=&simplify_m=
//! GET /api/v1/datasets/{name}?lat=&lon=&radius_m=&limit=&offset=&simplify_m=
//! ```

use actix_web::{get, web};
use serde::{Deserialize, Serialize};

use crate::domain::Error;
use crate::domain::features::{FeatureCollectionDto, FeatureQuery};
use crate::domain::geo::{BBox, GeoPoint};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Dataset listing response.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DatasetListDto {
    /// Names of the served datasets, sorted.
    pub datasets: Vec<&'static str>,
}

/// Query parameters for one feature request.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct FeatureQueryParams {
    /// Bounding box selector: `minx,miny,maxx,maxy` in WGS84.
    pub bbox: Option<String>,
    /// Radius selector centre latitude; requires `lon`.
    pub lat: Option<f64>,
    /// Radius selector centre longitude; requires `lat`.
    pub lon: Option<f64>,
    /// Radius in metres around the centre (default 300).
    pub radius_m: Option<f64>,
    /// Maximum features to return; clamped server-side.
    pub limit: Option<i64>,
    /// Features to skip; must not be negative.
    pub offset: Option<i64>,
    /// Geometry simplification tolerance in metres.
    pub simplify_m: Option<f64>,
}

impl FeatureQueryParams {
    fn into_query(self, dataset: String) -> Result<FeatureQuery, Error> {
        let mut query = FeatureQuery::for_dataset(dataset);
        match (self.bbox, self.lat, self.lon) {
            (Some(raw), None, None) => query.bbox = Some(BBox::parse(&raw)?),
            (None, Some(lat), Some(lon)) => {
                query.center = Some(GeoPoint::new(lat, lon)?);
                if let Some(radius_m) = self.radius_m {
                    query.radius_m = radius_m;
                }
            }
            // Neither selector set: let the service emit its usual message.
            (None, None, None) => {}
            _ => {
                return Err(Error::invalid_request(
                    "provide either bbox or both lat and lon, not a mixture",
                ));
            }
        }
        query.limit = self.limit;
        query.offset = self.offset.unwrap_or(0);
        query.simplify_m = self.simplify_m;
        Ok(query)
    }
}

/// List the served dataset names.
#[utoipa::path(
    get,
    path = "/api/v1/datasets",
    responses(
        (status = 200, description = "Dataset names", body = DatasetListDto),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["datasets"],
    operation_id = "listDatasets"
)]
#[get("/datasets")]
pub async fn list_datasets(state: web::Data<HttpState>) -> ApiResult<web::Json<DatasetListDto>> {
    Ok(web::Json(DatasetListDto {
        datasets: state.features.list_datasets(),
    }))
}

/// Query one dataset by bounding box or by point and radius.
#[utoipa::path(
    get,
    path = "/api/v1/datasets/{name}",
    params(
        ("name" = String, Path, description = "Dataset name"),
        FeatureQueryParams
    ),
    responses(
        (status = 200, description = "GeoJSON feature collection", body = FeatureCollectionDto),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "Unknown dataset", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["datasets"],
    operation_id = "queryDataset"
)]
#[get("/datasets/{name}")]
pub async fn query_dataset(
    state: web::Data<HttpState>,
    name: web::Path<String>,
    params: web::Query<FeatureQueryParams>,
) -> ApiResult<web::Json<FeatureCollectionDto>> {
    let query = params.into_inner().into_query(name.into_inner())?;
    let collection = state.features.list_features(&query).await?;
    Ok(web::Json(collection))
}
