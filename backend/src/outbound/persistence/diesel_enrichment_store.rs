//! PostgreSQL-backed enrichment cache store.
//!
//! One table per provider; reads filter on the encoded cache key, writes
//! upsert in place on key conflict.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{
    CacheRecord, EnrichmentStore, EnrichmentStoreError, Provider, SpatialKey,
};

use super::diesel_helpers::{map_diesel_error_message, map_pool_error_message};
use super::models::{RoadMetricsRow, WeatherDailyRow};
use super::pool::{DbPool, PoolError};
use super::schema::{road_metrics_cache, weather_daily_cache};

/// Diesel-backed implementation of the enrichment store port.
#[derive(Clone)]
pub struct DieselEnrichmentStore {
    pool: DbPool,
}

impl DieselEnrichmentStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> EnrichmentStoreError {
    EnrichmentStoreError::connection(map_pool_error_message(error))
}

fn map_diesel_error(operation: &'static str) -> impl FnOnce(diesel::result::Error) -> EnrichmentStoreError {
    move |error| EnrichmentStoreError::query(map_diesel_error_message(error, operation))
}

#[async_trait::async_trait]
impl EnrichmentStore for DieselEnrichmentStore {
    async fn get(
        &self,
        provider: Provider,
        key: &SpatialKey,
    ) -> Result<Option<CacheRecord>, EnrichmentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let encoded = key.encode();

        match provider {
            Provider::RoadFacilityMetrics => {
                let row: Option<RoadMetricsRow> = road_metrics_cache::table
                    .filter(road_metrics_cache::cache_key.eq(&encoded))
                    .select(RoadMetricsRow::as_select())
                    .first(&mut conn)
                    .await
                    .optional()
                    .map_err(map_diesel_error("road metrics cache read"))?;
                Ok(row.map(RoadMetricsRow::into_record))
            }
            Provider::WeatherDaily => {
                let row: Option<WeatherDailyRow> = weather_daily_cache::table
                    .filter(weather_daily_cache::cache_key.eq(&encoded))
                    .select(WeatherDailyRow::as_select())
                    .first(&mut conn)
                    .await
                    .optional()
                    .map_err(map_diesel_error("weather cache read"))?;
                Ok(row.map(WeatherDailyRow::into_record))
            }
        }
    }

    async fn upsert(&self, record: &CacheRecord) -> Result<(), EnrichmentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        match record.provider {
            Provider::RoadFacilityMetrics => {
                let row = RoadMetricsRow::from_record(record)?;
                diesel::insert_into(road_metrics_cache::table)
                    .values(&row)
                    .on_conflict(road_metrics_cache::cache_key)
                    .do_update()
                    .set(&row)
                    .execute(&mut conn)
                    .await
                    .map_err(map_diesel_error("road metrics cache upsert"))?;
            }
            Provider::WeatherDaily => {
                let row = WeatherDailyRow::from_record(record)?;
                diesel::insert_into(weather_daily_cache::table)
                    .values(&row)
                    .on_conflict(weather_daily_cache::cache_key)
                    .do_update()
                    .set(&row)
                    .execute(&mut conn)
                    .await
                    .map_err(map_diesel_error("weather cache upsert"))?;
            }
        }
        Ok(())
    }
}
