//! Shared doubles for HTTP handler tests.

use async_trait::async_trait;

use crate::domain::ports::{
    CacheRecord, EnrichmentStore, EnrichmentStoreError, Provider, SpatialKey,
};

/// Store that never holds anything; every read is a miss, every write is
/// accepted and dropped.
pub struct NoopStore;

#[async_trait]
impl EnrichmentStore for NoopStore {
    async fn get(
        &self,
        _provider: Provider,
        _key: &SpatialKey,
    ) -> Result<Option<CacheRecord>, EnrichmentStoreError> {
        Ok(None)
    }

    async fn upsert(&self, _record: &CacheRecord) -> Result<(), EnrichmentStoreError> {
        Ok(())
    }
}
