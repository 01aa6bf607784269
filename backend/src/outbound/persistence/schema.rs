//! Diesel table definitions for the cache tables.
//!
//! These definitions must match the database migrations exactly. The spatial
//! dataset tables are intentionally absent: their geometry columns are only
//! ever touched through raw PostGIS SQL in the spatial store adapter.

diesel::table! {
    /// Cached road/facility metric payloads, one row per quantised
    /// point-plus-radius key.
    road_metrics_cache (cache_key) {
        /// Primary key: `lat:lon:radius` with coordinates at 5 decimals.
        cache_key -> Varchar,
        /// Latitude times 1e5, rounded to nearest.
        lat_e5 -> Int8,
        /// Longitude times 1e5, rounded to nearest.
        lon_e5 -> Int8,
        /// Search radius in metres.
        radius_m -> Int4,
        /// Sanitised metrics payload.
        payload -> Jsonb,
        /// Timestamp of the write that produced the payload.
        computed_at -> Timestamptz,
        /// TTL in days captured at write time.
        ttl_days -> Int4,
    }
}

diesel::table! {
    /// Cached daily weather series, one row per quantised
    /// point-plus-date-range key.
    weather_daily_cache (cache_key) {
        /// Primary key: `lat:lon:start:end` with coordinates at 4 decimals.
        cache_key -> Varchar,
        /// Latitude times 1e4, rounded to nearest.
        lat_e4 -> Int8,
        /// Longitude times 1e4, rounded to nearest.
        lon_e4 -> Int8,
        /// First day of the series, inclusive.
        start_date -> Date,
        /// Last day of the series, inclusive.
        end_date -> Date,
        /// Sanitised series payload.
        payload -> Jsonb,
        /// Timestamp of the write that produced the payload.
        computed_at -> Timestamptz,
        /// TTL in days captured at write time.
        ttl_days -> Int4,
    }
}
