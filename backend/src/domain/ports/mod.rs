//! Domain ports defining the edges of the hexagon.
//!
//! Ports describe how the domain expects to interact with driven adapters
//! (the PostGIS spatial store, the cache store, upstream data providers).
//! Each trait exposes strongly typed errors so adapters map their failures
//! into predictable variants instead of returning `anyhow::Result`.

mod enrichment_store;
mod provider_source;
mod spatial_store;

pub use enrichment_store::{
    CacheRecord, EnrichmentStore, EnrichmentStoreError, Provider, QuantisedPoint, SpatialKey,
};
pub use provider_source::{ProviderUnavailable, RoadMetricsSource, WeatherSource};
pub use spatial_store::{Feature, Page, SpatialStore, SpatialStoreError};

#[cfg(test)]
pub use provider_source::{MockRoadMetricsSource, MockWeatherSource};
#[cfg(test)]
pub use spatial_store::MockSpatialStore;
