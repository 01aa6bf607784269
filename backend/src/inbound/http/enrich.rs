//! Point enrichment API handler.
//!
//! ```text
//! GET /api/v1/enrich/point?lat=&lon=&radius_m=&start=&end=&datasets=&mode=&refresh=&limit=&simplify_m=
//! ```
//!
//! The response is a composite: per-provider slots degrade independently, so
//! a 200 may carry an unavailable slot alongside successful ones.

use actix_web::{get, web};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::Error;
use crate::domain::enrichment::{EnrichRequest, EnrichmentResult, QueryMode};
use crate::domain::geo::GeoPoint;
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Default search radius in metres when the request omits one.
const DEFAULT_RADIUS_M: u32 = 300;

/// Query parameters for one enrichment request.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct EnrichParams {
    /// Target latitude in WGS84 degrees.
    pub lat: Option<f64>,
    /// Target longitude in WGS84 degrees.
    pub lon: Option<f64>,
    /// Search radius in metres (default 300, capped server-side).
    pub radius_m: Option<u32>,
    /// First day of the weather range; requires `end`.
    pub start: Option<NaiveDate>,
    /// Last day of the weather range; requires `start`.
    pub end: Option<NaiveDate>,
    /// Comma-separated dataset names to query geometries for.
    pub datasets: Option<String>,
    /// Geometry selection mode: `bbox`, `radius`, `both`, or `none`
    /// (default `both`).
    pub mode: Option<String>,
    /// Force recomputation of cached providers.
    pub refresh: Option<bool>,
    /// Per-dataset feature limit; clamped server-side.
    pub limit: Option<i64>,
    /// Geometry simplification tolerance in metres.
    pub simplify_m: Option<f64>,
}

impl EnrichParams {
    fn into_request(self) -> Result<EnrichRequest, Error> {
        let (Some(lat), Some(lon)) = (self.lat, self.lon) else {
            return Err(Error::invalid_request("lat and lon are required"));
        };
        let point = GeoPoint::new(lat, lon)?;

        let date_range = match (self.start, self.end) {
            (Some(start), Some(end)) => Some((start, end)),
            (None, None) => None,
            _ => {
                return Err(Error::invalid_request(
                    "start and end must be provided together",
                ));
            }
        };

        let datasets = self
            .datasets
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();

        let mode = match self.mode.as_deref() {
            None => QueryMode::Both,
            Some(raw) => raw.parse()?,
        };

        Ok(EnrichRequest {
            point,
            radius_m: self.radius_m.unwrap_or(DEFAULT_RADIUS_M),
            date_range,
            datasets,
            mode,
            refresh: self.refresh.unwrap_or(false),
            limit: self.limit,
            simplify_m: self.simplify_m,
        })
    }
}

/// Enrich a point with provider metrics and dataset geometries.
#[utoipa::path(
    get,
    path = "/api/v1/enrich/point",
    params(EnrichParams),
    responses(
        (status = 200, description = "Composite enrichment result", body = EnrichmentResult),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "Unknown dataset", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["enrichment"],
    operation_id = "enrichPoint"
)]
#[get("/enrich/point")]
pub async fn enrich_point(
    state: web::Data<HttpState>,
    params: web::Query<EnrichParams>,
) -> ApiResult<web::Json<EnrichmentResult>> {
    let request = params.into_inner().into_request()?;
    let result = state.enrichment.enrich_point(&request).await?;
    Ok(web::Json(result))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test as actix_test, web};
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::*;
    use crate::domain::cache::EnrichmentCache;
    use crate::domain::enrichment::{EnrichmentPolicy, EnrichmentService};
    use crate::domain::features::SpatialQueryService;
    use crate::domain::ports::{MockRoadMetricsSource, MockSpatialStore, MockWeatherSource};
    use crate::inbound::http::test_support::NoopStore;

    fn state(roads: MockRoadMetricsSource, weather: MockWeatherSource) -> HttpState {
        state_with_store(roads, weather, MockSpatialStore::new())
    }

    fn state_with_store(
        roads: MockRoadMetricsSource,
        weather: MockWeatherSource,
        spatial: MockSpatialStore,
    ) -> HttpState {
        let features = Arc::new(SpatialQueryService::new(Arc::new(spatial), 20_000, 5_000));
        let cache = Arc::new(EnrichmentCache::new(
            Arc::new(NoopStore),
            Arc::new(mockable::DefaultClock),
        ));
        let enrichment = Arc::new(EnrichmentService::new(
            cache,
            Arc::new(roads),
            Arc::new(weather),
            features.clone(),
            EnrichmentPolicy::default(),
        ));
        HttpState::new(enrichment, features)
    }

    async fn get_json(state: HttpState, path: &str) -> (u16, Value) {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(enrich_point),
        )
        .await;
        let request = actix_test::TestRequest::get().uri(path).to_request();
        let response = actix_test::call_service(&app, request).await;
        let status = response.status().as_u16();
        let body = actix_test::read_body(response).await;
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[actix_rt::test]
    async fn serves_a_minimal_enrichment() {
        let mut roads = MockRoadMetricsSource::new();
        roads
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(json!({ "road_total_length_m": 812.4 })));

        let (status, body) = get_json(
            state(roads, MockWeatherSource::new()),
            "/enrich/point?lat=42.6977&lon=23.3219",
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["radius_m"], 300, "default radius applies");
        assert_eq!(body["osm_metrics"]["status"], "available");
        assert!(body.get("weather_daily").is_none());
    }

    #[actix_rt::test]
    async fn omitted_mode_queries_geometries_both_ways() {
        let mut roads = MockRoadMetricsSource::new();
        roads
            .expect_fetch()
            .returning(|_, _| Ok(json!({ "road_total_length_m": 0.0 })));
        let mut spatial = MockSpatialStore::new();
        spatial
            .expect_query_bbox()
            .times(1)
            .returning(|_, _, _, _| Ok(Vec::new()));
        spatial
            .expect_query_radius()
            .times(1)
            .returning(|_, _, _, _, _| Ok(Vec::new()));

        let (status, body) = get_json(
            state_with_store(roads, MockWeatherSource::new(), spatial),
            "/enrich/point?lat=42.6977&lon=23.3219&datasets=trees",
        )
        .await;
        assert_eq!(status, 200);
        let trees = &body["geometries"]["datasets"]["trees"];
        assert!(trees.get("bbox").is_some(), "bbox collection expected");
        assert!(trees.get("radius").is_some(), "radius collection expected");
    }

    #[actix_rt::test]
    async fn a_failed_provider_still_returns_200() {
        let mut roads = MockRoadMetricsSource::new();
        roads.expect_fetch().returning(|_, _| {
            Err(crate::domain::ports::ProviderUnavailable::timeout(
                "upstream gone",
            ))
        });

        let (status, body) = get_json(
            state(roads, MockWeatherSource::new()),
            "/enrich/point?lat=42.6977&lon=23.3219",
        )
        .await;
        assert_eq!(status, 200, "per-slot failures degrade, not fail");
        assert_eq!(body["osm_metrics"]["status"], "unavailable");
    }

    #[rstest]
    #[case::missing_coordinates("/enrich/point?lat=42.6977")]
    #[case::start_without_end("/enrich/point?lat=42.6977&lon=23.3219&start=2025-06-01")]
    #[case::inverted_range(
        "/enrich/point?lat=42.6977&lon=23.3219&start=2025-06-30&end=2025-06-01"
    )]
    #[case::bad_mode("/enrich/point?lat=42.6977&lon=23.3219&mode=everything")]
    #[case::zero_radius("/enrich/point?lat=42.6977&lon=23.3219&radius_m=0")]
    #[actix_rt::test]
    async fn rejects_bad_parameters(#[case] path: &str) {
        let (status, body) = get_json(
            state(MockRoadMetricsSource::new(), MockWeatherSource::new()),
            path,
        )
        .await;
        assert_eq!(status, 400, "{path} should be a client error");
        assert_eq!(body["code"], "invalid_request");
    }

    #[actix_rt::test]
    async fn unknown_dataset_is_a_404() {
        let (status, body) = get_json(
            state(MockRoadMetricsSource::new(), MockWeatherSource::new()),
            "/enrich/point?lat=42.6977&lon=23.3219&datasets=rivers&mode=bbox",
        )
        .await;
        assert_eq!(status, 404);
        assert_eq!(body["code"], "unknown_dataset");
    }
}
