//! Diesel row structs for the cache tables and their domain conversions.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use crate::domain::ports::{
    CacheRecord, EnrichmentStoreError, Provider, QuantisedPoint, SpatialKey,
};

use super::schema::{road_metrics_cache, weather_daily_cache};

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = road_metrics_cache)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct RoadMetricsRow {
    pub(super) cache_key: String,
    pub(super) lat_e5: i64,
    pub(super) lon_e5: i64,
    pub(super) radius_m: i32,
    pub(super) payload: Value,
    pub(super) computed_at: DateTime<Utc>,
    pub(super) ttl_days: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = weather_daily_cache)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct WeatherDailyRow {
    pub(super) cache_key: String,
    pub(super) lat_e4: i64,
    pub(super) lon_e4: i64,
    pub(super) start_date: chrono::NaiveDate,
    pub(super) end_date: chrono::NaiveDate,
    pub(super) payload: Value,
    pub(super) computed_at: DateTime<Utc>,
    pub(super) ttl_days: i32,
}

fn cast_ttl_for_db(ttl_days: u32) -> Result<i32, EnrichmentStoreError> {
    i32::try_from(ttl_days)
        .map_err(|_| EnrichmentStoreError::query(format!("ttl_days {ttl_days} exceeds i32")))
}

fn cast_ttl(ttl_days: i32) -> u32 {
    u32::try_from(ttl_days).unwrap_or(0)
}

impl RoadMetricsRow {
    pub(super) fn from_record(record: &CacheRecord) -> Result<Self, EnrichmentStoreError> {
        let SpatialKey::PointRadius { point, radius_m } = record.key else {
            return Err(EnrichmentStoreError::query(
                "road metrics record requires a point-radius key",
            ));
        };
        Ok(Self {
            cache_key: record.key.encode(),
            lat_e5: point.lat_scaled,
            lon_e5: point.lon_scaled,
            radius_m: i32::try_from(radius_m)
                .map_err(|_| EnrichmentStoreError::query("radius_m exceeds i32"))?,
            payload: record.payload.clone(),
            computed_at: record.computed_at,
            ttl_days: cast_ttl_for_db(record.ttl_days)?,
        })
    }

    pub(super) fn into_record(self) -> CacheRecord {
        let point = QuantisedPoint {
            lat_scaled: self.lat_e5,
            lon_scaled: self.lon_e5,
            precision: Provider::RoadFacilityMetrics.coord_precision(),
        };
        CacheRecord {
            provider: Provider::RoadFacilityMetrics,
            key: SpatialKey::PointRadius {
                point,
                radius_m: u32::try_from(self.radius_m).unwrap_or(0),
            },
            payload: self.payload,
            computed_at: self.computed_at,
            ttl_days: cast_ttl(self.ttl_days),
        }
    }
}

impl WeatherDailyRow {
    pub(super) fn from_record(record: &CacheRecord) -> Result<Self, EnrichmentStoreError> {
        let SpatialKey::PointDateRange { point, start, end } = record.key else {
            return Err(EnrichmentStoreError::query(
                "weather record requires a point-date-range key",
            ));
        };
        Ok(Self {
            cache_key: record.key.encode(),
            lat_e4: point.lat_scaled,
            lon_e4: point.lon_scaled,
            start_date: start,
            end_date: end,
            payload: record.payload.clone(),
            computed_at: record.computed_at,
            ttl_days: cast_ttl_for_db(record.ttl_days)?,
        })
    }

    pub(super) fn into_record(self) -> CacheRecord {
        let point = QuantisedPoint {
            lat_scaled: self.lat_e4,
            lon_scaled: self.lon_e4,
            precision: Provider::WeatherDaily.coord_precision(),
        };
        CacheRecord {
            provider: Provider::WeatherDaily,
            key: SpatialKey::PointDateRange {
                point,
                start: self.start_date,
                end: self.end_date,
            },
            payload: self.payload,
            computed_at: self.computed_at,
            ttl_days: cast_ttl(self.ttl_days),
        }
    }
}
