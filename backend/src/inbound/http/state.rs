//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on the domain services and remain testable without I/O.

use std::sync::Arc;

use crate::domain::enrichment::EnrichmentService;
use crate::domain::features::SpatialQueryService;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Combined point-enrichment orchestrator.
    pub enrichment: Arc<EnrichmentService>,
    /// Validated dataset feature queries.
    pub features: Arc<SpatialQueryService>,
}

impl HttpState {
    /// Bundle the constructed services for handler injection.
    pub fn new(enrichment: Arc<EnrichmentService>, features: Arc<SpatialQueryService>) -> Self {
        Self {
            enrichment,
            features,
        }
    }
}
