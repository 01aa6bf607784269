//! TTL-bounded enrichment cache with single-flight recomputation.
//!
//! The cache sits between the orchestrator and the upstream connectors. Its
//! contract, in order of precedence:
//!
//! - a fresh entry (age within the TTL captured at write time) is returned
//!   without touching the upstream;
//! - a miss or stale entry triggers one compute, whose sanitised result is
//!   upserted and returned;
//! - `force_refresh` always computes and overwrites;
//! - a failed compute never persists anything and never evicts an existing
//!   entry — a stale-but-present value is served instead of the error;
//! - store failures fail open: a failed read is a miss, a failed write is
//!   logged and the computed payload still flows to the caller.
//!
//! Single-flight holds per `(provider, key)` within the process: concurrent
//! callers for one key share a single upstream compute while other keys
//! proceed unblocked. The key-map lock guards only map mutation, never the
//! compute itself. Across processes the store's upsert-by-key atomicity makes
//! duplicate computes harmless.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::TimeDelta;
use mockable::Clock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::ports::{
    CacheRecord, EnrichmentStore, Provider, ProviderUnavailable, SpatialKey,
};
use crate::domain::sanitize::sanitize;

type FlightMap = HashMap<(Provider, SpatialKey), Arc<tokio::sync::Mutex<()>>>;

/// Cache lookup outcome returned to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome {
    /// Sanitised provider payload.
    pub payload: Value,
    /// True when the payload came from a persisted entry rather than a fresh
    /// upstream compute (including a stale entry served after a failed
    /// refresh).
    pub was_cached: bool,
}

/// TTL-bounded, single-flight cache over the enrichment store.
pub struct EnrichmentCache {
    store: Arc<dyn EnrichmentStore>,
    clock: Arc<dyn Clock>,
    inflight: Mutex<FlightMap>,
}

impl EnrichmentCache {
    /// Build a cache over `store`, using `clock` for staleness decisions.
    pub fn new(store: Arc<dyn EnrichmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached payload for `(provider, key)` or compute, persist,
    /// and return a fresh one.
    ///
    /// `ttl_days` is the currently configured TTL for `provider`; it is
    /// captured into the record at write time. Freshness of an existing
    /// entry is judged against the TTL stored in that entry, not the current
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns the compute's [`ProviderUnavailable`] only when no previous
    /// entry exists to fall back on.
    pub async fn get_or_compute<F, Fut>(
        &self,
        provider: Provider,
        key: SpatialKey,
        ttl_days: u32,
        force_refresh: bool,
        compute: F,
    ) -> Result<CacheOutcome, ProviderUnavailable>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ProviderUnavailable>>,
    {
        if !force_refresh
            && let Some(record) = self.lookup(provider, &key).await
            && self.is_fresh(&record)
        {
            debug!(provider = %provider, key = %key, "cache hit");
            return Ok(CacheOutcome {
                payload: record.payload,
                was_cached: true,
            });
        }

        let flight = self.checkout_flight(provider, key);
        let outcome = {
            let _guard = flight.lock().await;

            // Another flight may have refreshed the entry while we queued.
            let existing = self.lookup(provider, &key).await;
            if !force_refresh
                && let Some(record) = &existing
                && self.is_fresh(record)
            {
                debug!(provider = %provider, key = %key, "cache hit after flight wait");
                Ok(CacheOutcome {
                    payload: record.payload.clone(),
                    was_cached: true,
                })
            } else {
                self.compute_and_persist(provider, key, ttl_days, existing, compute)
                    .await
            }
        };
        self.release_flight(provider, key, &flight);
        outcome
    }

    async fn compute_and_persist<F, Fut>(
        &self,
        provider: Provider,
        key: SpatialKey,
        ttl_days: u32,
        existing: Option<CacheRecord>,
        compute: F,
    ) -> Result<CacheOutcome, ProviderUnavailable>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ProviderUnavailable>>,
    {
        let payload = match compute().await {
            Ok(payload) => sanitize(payload),
            Err(error) => {
                // The failed attempt must not destroy a servable entry.
                if let Some(record) = existing {
                    warn!(
                        provider = %provider,
                        key = %key,
                        error = %error,
                        "refresh failed; serving stale entry"
                    );
                    return Ok(CacheOutcome {
                        payload: record.payload,
                        was_cached: true,
                    });
                }
                return Err(error);
            }
        };

        let record = CacheRecord {
            provider,
            key,
            payload: payload.clone(),
            computed_at: self.clock.utc(),
            ttl_days,
        };
        if let Err(error) = self.store.upsert(&record).await {
            // Fail open: the caller still gets the computed payload.
            warn!(provider = %provider, key = %key, error = %error, "cache write failed");
        }
        Ok(CacheOutcome {
            payload,
            was_cached: false,
        })
    }

    /// Read through to the store, treating read failures as misses.
    async fn lookup(&self, provider: Provider, key: &SpatialKey) -> Option<CacheRecord> {
        match self.store.get(provider, key).await {
            Ok(record) => record,
            Err(error) => {
                warn!(provider = %provider, key = %key, error = %error, "cache read failed");
                None
            }
        }
    }

    fn is_fresh(&self, record: &CacheRecord) -> bool {
        let age = self.clock.utc().signed_duration_since(record.computed_at);
        age <= TimeDelta::days(i64::from(record.ttl_days))
    }

    fn checkout_flight(
        &self,
        provider: Provider,
        key: SpatialKey,
    ) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.lock_flights();
        map.entry((provider, key)).or_default().clone()
    }

    fn release_flight(
        &self,
        provider: Provider,
        key: SpatialKey,
        flight: &Arc<tokio::sync::Mutex<()>>,
    ) {
        let mut map = self.lock_flights();
        // Two strong references mean the map entry plus ours: nobody else is
        // queued on this key, so the entry can be dropped.
        if Arc::strong_count(flight) <= 2 {
            map.remove(&(provider, key));
        }
    }

    fn lock_flights(&self) -> std::sync::MutexGuard<'_, FlightMap> {
        match self.inflight.lock() {
            Ok(guard) => guard,
            // The map only ever holds plain data; a poisoned lock still
            // contains a usable map.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
