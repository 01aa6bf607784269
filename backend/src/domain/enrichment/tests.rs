//! Orchestration tests: slot independence, input validation before I/O, and
//! refresh semantics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use mockable::Clock;
use rstest::{fixture, rstest};
use serde_json::json;

use super::{
    EnrichRequest, EnrichmentPolicy, EnrichmentService, FeatureSlot, ProviderSlot, QueryMode,
};
use crate::domain::ErrorCode;
use crate::domain::cache::EnrichmentCache;
use crate::domain::features::SpatialQueryService;
use crate::domain::geo::GeoPoint;
use crate::domain::ports::{
    CacheRecord, EnrichmentStore, EnrichmentStoreError, MockRoadMetricsSource, MockSpatialStore,
    MockWeatherSource, Provider, ProviderUnavailable, QuantisedPoint, SpatialKey,
};

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
struct MemoryStore {
    records: Mutex<HashMap<(Provider, SpatialKey), CacheRecord>>,
}

impl MemoryStore {
    fn seed(&self, record: CacheRecord) {
        self.records
            .lock()
            .expect("records mutex")
            .insert((record.provider, record.key), record);
    }
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
        self.seed(record.clone());
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid time")
}

fn sofia() -> GeoPoint {
    GeoPoint::new(42.6977, 23.3219).expect("valid point")
}

fn june() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date"),
        NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date"),
    )
}

fn request() -> EnrichRequest {
    EnrichRequest {
        point: sofia(),
        radius_m: 300,
        date_range: None,
        datasets: Vec::new(),
        mode: QueryMode::None,
        refresh: false,
        limit: None,
        simplify_m: None,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    roads: MockRoadMetricsSource,
    weather: MockWeatherSource,
    spatial: MockSpatialStore,
    policy: EnrichmentPolicy,
}

#[fixture]
fn harness() -> Harness {
    Harness {
        store: Arc::new(MemoryStore::default()),
        roads: MockRoadMetricsSource::new(),
        weather: MockWeatherSource::new(),
        spatial: MockSpatialStore::new(),
        policy: EnrichmentPolicy::default(),
    }
}

impl Harness {
    fn build(self) -> EnrichmentService {
        let cache = Arc::new(EnrichmentCache::new(
            self.store,
            Arc::new(FixedClock(now())),
        ));
        let features = Arc::new(SpatialQueryService::new(Arc::new(self.spatial), 20_000, 5_000));
        EnrichmentService::new(
            cache,
            Arc::new(self.roads),
            Arc::new(self.weather),
            features,
            self.policy,
        )
    }
}

fn stub_roads(harness: &mut Harness) {
    harness
        .roads
        .expect_fetch()
        .returning(|_, _| Ok(json!({ "road_total_length_m": 812.4 })));
}

#[rstest]
#[tokio::test]
async fn combines_all_three_slots(mut harness: Harness) {
    stub_roads(&mut harness);
    harness
        .weather
        .expect_fetch_daily()
        .times(1)
        .returning(|_, _, _| Ok(json!({ "daily": [] })));
    harness
        .spatial
        .expect_query_bbox()
        .times(1)
        .returning(|_, _, _, _| Ok(Vec::new()));
    harness
        .spatial
        .expect_query_radius()
        .times(1)
        .returning(|_, _, _, _, _| Ok(Vec::new()));

    let mut request = request();
    request.date_range = Some(june());
    request.datasets = vec!["streets".to_owned()];
    request.mode = QueryMode::Both;

    let result = harness
        .build()
        .enrich_point(&request)
        .await
        .expect("request succeeds");

    assert!(matches!(
        result.osm_metrics,
        ProviderSlot::Available { cached: false, .. }
    ));
    assert!(matches!(
        result.weather_daily,
        Some(ProviderSlot::Available { .. })
    ));
    let FeatureSlot::Available { datasets } =
        result.geometries.expect("geometries were requested")
    else {
        panic!("geometry slot must be available");
    };
    let streets = datasets.get("streets").expect("requested dataset present");
    assert!(streets.bbox.is_some(), "mode=both returns the bbox view");
    assert!(streets.radius.is_some(), "mode=both returns the radius view");
}

#[rstest]
#[tokio::test]
async fn weather_failure_degrades_only_its_slot(mut harness: Harness) {
    stub_roads(&mut harness);
    harness
        .weather
        .expect_fetch_daily()
        .returning(|_, _, _| Err(ProviderUnavailable::timeout("archive gone")));

    let mut request = request();
    request.date_range = Some(june());

    let result = harness
        .build()
        .enrich_point(&request)
        .await
        .expect("a degraded slot must not fail the request");

    assert!(matches!(result.osm_metrics, ProviderSlot::Available { .. }));
    assert!(matches!(
        result.weather_daily,
        Some(ProviderSlot::Unavailable { .. })
    ));
}

#[rstest]
#[tokio::test]
async fn weather_is_skipped_without_a_date_range(mut harness: Harness) {
    stub_roads(&mut harness);
    // No expectation on the weather mock: any call would panic the test.

    let result = harness
        .build()
        .enrich_point(&request())
        .await
        .expect("request succeeds");
    assert!(result.weather_daily.is_none());
    assert!(result.geometries.is_none(), "no datasets were requested");
}

#[rstest]
#[case::inverted(2025, 6, 30, 2025, 6, 1)]
#[case::oversized(2024, 1, 1, 2026, 1, 1)]
#[tokio::test]
async fn rejects_bad_date_ranges_before_any_fetch(
    harness: Harness,
    #[case] sy: i32,
    #[case] sm: u32,
    #[case] sd: u32,
    #[case] ey: i32,
    #[case] em: u32,
    #[case] ed: u32,
) {
    let mut request = request();
    request.date_range = Some((
        NaiveDate::from_ymd_opt(sy, sm, sd).expect("valid date"),
        NaiveDate::from_ymd_opt(ey, em, ed).expect("valid date"),
    ));

    // Unstubbed mocks verify no I/O happens on the rejection path.
    let error = harness
        .build()
        .enrich_point(&request)
        .await
        .expect_err("range must be rejected");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[case::zero(0)]
#[case::above_max(1_001)]
#[tokio::test]
async fn rejects_out_of_range_radius(harness: Harness, #[case] radius_m: u32) {
    let mut request = request();
    request.radius_m = radius_m;

    let error = harness
        .build()
        .enrich_point(&request)
        .await
        .expect_err("radius must be rejected");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn rejects_unknown_datasets_before_any_fetch(harness: Harness) {
    let mut request = request();
    request.datasets = vec!["streets".to_owned(), "rivers".to_owned()];
    request.mode = QueryMode::BBox;

    let error = harness
        .build()
        .enrich_point(&request)
        .await
        .expect_err("unknown dataset must be rejected");
    assert_eq!(error.code(), ErrorCode::UnknownDataset);
}

#[rstest]
#[tokio::test]
async fn mode_none_skips_geometry_queries(mut harness: Harness) {
    stub_roads(&mut harness);

    let mut request = request();
    request.datasets = vec!["streets".to_owned()];
    request.mode = QueryMode::None;

    let result = harness
        .build()
        .enrich_point(&request)
        .await
        .expect("request succeeds");
    assert!(result.geometries.is_none());
}

#[rstest]
#[tokio::test]
async fn fresh_cache_entry_skips_the_connector(mut harness: Harness) {
    let key = SpatialKey::PointRadius {
        point: QuantisedPoint::quantise(sofia(), 5),
        radius_m: 300,
    };
    harness.store.seed(CacheRecord {
        provider: Provider::RoadFacilityMetrics,
        key,
        payload: json!({ "road_total_length_m": 500.0 }),
        computed_at: now(),
        ttl_days: 30,
    });
    // No expectation on the roads mock: a connector call would panic.

    let result = harness
        .build()
        .enrich_point(&request())
        .await
        .expect("request succeeds");
    assert!(matches!(
        result.osm_metrics,
        ProviderSlot::Available { cached: true, .. }
    ));
}

#[rstest]
#[tokio::test]
async fn refresh_bypasses_a_fresh_cache_entry(mut harness: Harness) {
    let key = SpatialKey::PointRadius {
        point: QuantisedPoint::quantise(sofia(), 5),
        radius_m: 300,
    };
    harness.store.seed(CacheRecord {
        provider: Provider::RoadFacilityMetrics,
        key,
        payload: json!({ "road_total_length_m": 500.0 }),
        computed_at: now(),
        ttl_days: 30,
    });
    harness
        .roads
        .expect_fetch()
        .times(1)
        .returning(|_, _| Ok(json!({ "road_total_length_m": 812.4 })));

    let mut request = request();
    request.refresh = true;

    let result = harness
        .build()
        .enrich_point(&request)
        .await
        .expect("request succeeds");
    let ProviderSlot::Available { cached, data } = result.osm_metrics else {
        panic!("metrics slot must be available");
    };
    assert!(!cached, "refresh must recompute");
    assert_eq!(data, json!({ "road_total_length_m": 812.4 }));
}

#[rstest]
#[tokio::test]
async fn geometry_store_failure_degrades_the_slot(mut harness: Harness) {
    stub_roads(&mut harness);
    harness.spatial.expect_query_bbox().returning(|_, _, _, _| {
        Err(crate::domain::ports::SpatialStoreError::query(
            "relation does not exist",
        ))
    });

    let mut request = request();
    request.datasets = vec!["streets".to_owned()];
    request.mode = QueryMode::BBox;

    let result = harness
        .build()
        .enrich_point(&request)
        .await
        .expect("a degraded geometry slot must not fail the request");
    assert!(matches!(
        result.geometries,
        Some(FeatureSlot::Unavailable { .. })
    ));
    assert!(matches!(result.osm_metrics, ProviderSlot::Available { .. }));
}

#[rstest]
#[tokio::test]
async fn response_slots_carry_status_tags(mut harness: Harness) {
    stub_roads(&mut harness);

    let result = harness
        .build()
        .enrich_point(&request())
        .await
        .expect("request succeeds");
    let json = serde_json::to_value(&result).expect("result serialises");
    assert_eq!(json["osm_metrics"]["status"], "available");
    assert_eq!(json["radius_m"], 300);
    assert!(json.get("weather_daily").is_none());
}
