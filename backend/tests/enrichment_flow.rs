//! End-to-end flow over the HTTP surface with in-memory adapters: datasets,
//! enrichment slots, cache hits across requests, and the health probes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::{App, test as actix_test, web};
use async_trait::async_trait;
use chrono::NaiveDate;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use ::backend::domain::cache::EnrichmentCache;
use ::backend::domain::datasets::DatasetSchema;
use ::backend::domain::enrichment::{EnrichmentPolicy, EnrichmentService};
use ::backend::domain::features::SpatialQueryService;
use ::backend::domain::geo::{BBox, GeoPoint};
use ::backend::domain::ports::{
    CacheRecord, EnrichmentStore, EnrichmentStoreError, Feature, Page, Provider,
    ProviderUnavailable, RoadMetricsSource, SpatialKey, SpatialStore, SpatialStoreError,
    WeatherSource,
};
use ::backend::inbound::http::health::{HealthState, live, ready};
use ::backend::inbound::http::state::HttpState;
use ::backend::inbound::http::{datasets, enrich};

#[derive(Default)]
struct MemoryStore {
    records: Mutex<HashMap<(Provider, SpatialKey), CacheRecord>>,
}

#[async_trait]
impl EnrichmentStore for MemoryStore {
    async fn get(
        &self,
        provider: Provider,
        key: &SpatialKey,
    ) -> Result<Option<CacheRecord>, EnrichmentStoreError> {
        Ok(self
            .records
            .lock()
            .expect("records mutex")
            .get(&(provider, *key))
            .cloned())
    }

    async fn upsert(&self, record: &CacheRecord) -> Result<(), EnrichmentStoreError> {
        self.records
            .lock()
            .expect("records mutex")
            .insert((record.provider, record.key), record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct CountingRoads {
    calls: AtomicUsize,
}

#[async_trait]
impl RoadMetricsSource for CountingRoads {
    async fn fetch(&self, _center: GeoPoint, radius_m: u32) -> Result<Value, ProviderUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "source": "overpass",
            "buffer_m": radius_m,
            "road_total_length_m": 812.4,
        }))
    }
}

struct FixedWeather;

#[async_trait]
impl WeatherSource for FixedWeather {
    async fn fetch_daily(
        &self,
        _center: GeoPoint,
        start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Value, ProviderUnavailable> {
        Ok(json!({
            "provider": "open-meteo",
            "days": [{ "date": start.to_string(), "temperature_mean_c": 21.5 }],
        }))
    }
}

struct SingleFeatureStore;

#[async_trait]
impl SpatialStore for SingleFeatureStore {
    async fn query_bbox(
        &self,
        _schema: &DatasetSchema,
        _bbox: BBox,
        _page: Page,
        _simplify_m: Option<f64>,
    ) -> Result<Vec<Feature>, SpatialStoreError> {
        Ok(vec![feature(1)])
    }

    async fn query_radius(
        &self,
        _schema: &DatasetSchema,
        _center: GeoPoint,
        _radius_m: f64,
        _page: Page,
        _simplify_m: Option<f64>,
    ) -> Result<Vec<Feature>, SpatialStoreError> {
        Ok(vec![feature(2)])
    }
}

fn feature(id: i64) -> Feature {
    Feature {
        id,
        source_id: Some(format!("node/{id}")),
        properties: json!({ "species": "Tilia tomentosa" }),
        geometry: json!({ "type": "Point", "coordinates": [23.3219, 42.6977] }),
    }
}

struct Backend {
    roads: Arc<CountingRoads>,
    state: HttpState,
}

#[fixture]
fn backend() -> Backend {
    let roads = Arc::new(CountingRoads::default());
    let features = Arc::new(SpatialQueryService::new(
        Arc::new(SingleFeatureStore),
        20_000,
        5_000,
    ));
    let cache = Arc::new(EnrichmentCache::new(
        Arc::new(MemoryStore::default()),
        Arc::new(mockable::DefaultClock),
    ));
    let enrichment = Arc::new(EnrichmentService::new(
        cache,
        roads.clone(),
        Arc::new(FixedWeather),
        features.clone(),
        EnrichmentPolicy::default(),
    ));
    Backend {
        roads,
        state: HttpState::new(enrichment, features),
    }
}

async fn get_json(state: &HttpState, health: &web::Data<HealthState>, path: &str) -> (u16, Value) {
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(health.clone())
            .service(
                web::scope("/api/v1")
                    .service(live)
                    .service(ready)
                    .service(datasets::list_datasets)
                    .service(datasets::query_dataset)
                    .service(enrich::enrich_point),
            ),
    )
    .await;
    let request = actix_test::TestRequest::get().uri(path).to_request();
    let response = actix_test::call_service(&app, request).await;
    let status = response.status().as_u16();
    let body = actix_test::read_body(response).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn ready_health() -> web::Data<HealthState> {
    let health = web::Data::new(HealthState::new());
    health.mark_ready();
    health
}

#[rstest]
#[actix_rt::test]
async fn dataset_listing_and_query_round_trip(backend: Backend) {
    let health = ready_health();

    let (status, body) = get_json(&backend.state, &health, "/api/v1/datasets").await;
    assert_eq!(status, 200);
    let names = body["datasets"].as_array().expect("dataset array");
    assert_eq!(names.len(), 7);
    assert!(names.iter().any(|name| name == "trees"));

    let (status, body) = get_json(
        &backend.state,
        &health,
        "/api/v1/datasets/trees?lat=42.6977&lon=23.3219&radius_m=250",
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["type"], "FeatureCollection");
    assert_eq!(body["features"][0]["properties"]["source_id"], "node/2");
}

#[rstest]
#[actix_rt::test]
async fn enrichment_combines_slots_and_reuses_the_cache(backend: Backend) {
    let health = ready_health();
    let path = "/api/v1/enrich/point?lat=42.6977&lon=23.3219&radius_m=400\
                &start=2025-06-01&end=2025-06-07&datasets=trees,buildings&mode=both";

    let (status, body) = get_json(&backend.state, &health, path).await;
    assert_eq!(status, 200);
    assert_eq!(body["osm_metrics"]["status"], "available");
    assert_eq!(body["osm_metrics"]["cached"], false);
    assert_eq!(body["weather_daily"]["status"], "available");
    assert_eq!(body["geometries"]["status"], "available");
    let trees = &body["geometries"]["datasets"]["trees"];
    assert_eq!(trees["bbox"]["features"][0]["id"], 1);
    assert_eq!(trees["radius"]["features"][0]["id"], 2);

    let (status, body) = get_json(&backend.state, &health, path).await;
    assert_eq!(status, 200);
    assert_eq!(body["osm_metrics"]["cached"], true, "second call hits the cache");
    assert_eq!(backend.roads.calls.load(Ordering::SeqCst), 1);
}

#[rstest]
#[actix_rt::test]
async fn refresh_forces_a_second_upstream_call(backend: Backend) {
    let health = ready_health();
    let path = "/api/v1/enrich/point?lat=42.6977&lon=23.3219";

    let (status, _) = get_json(&backend.state, &health, path).await;
    assert_eq!(status, 200);

    let refreshed = format!("{path}&refresh=true");
    let (status, body) = get_json(&backend.state, &health, &refreshed).await;
    assert_eq!(status, 200);
    assert_eq!(body["osm_metrics"]["cached"], false);
    assert_eq!(backend.roads.calls.load(Ordering::SeqCst), 2);
}

#[rstest]
#[actix_rt::test]
async fn probes_reflect_readiness(backend: Backend) {
    let health = web::Data::new(HealthState::new());

    let (status, _) = get_json(&backend.state, &health, "/api/v1/health/live").await;
    assert_eq!(status, 200);
    let (status, _) = get_json(&backend.state, &health, "/api/v1/health/ready").await;
    assert_eq!(status, 503, "not ready until marked");

    health.mark_ready();
    let (status, _) = get_json(&backend.state, &health, "/api/v1/health/ready").await;
    assert_eq!(status, 200);

    health.mark_unhealthy();
    let (status, _) = get_json(&backend.state, &health, "/api/v1/health/live").await;
    assert_eq!(status, 503, "draining fails liveness");
}
