//! Domain services, primitives, and ports.
//!
//! Purpose: Hold the transport-agnostic core of the service — the enrichment
//! cache, the spatial query service, the orchestrator, and the ports they
//! talk through. Adapters live outside this module and depend inward only.
//!
//! Public surface:
//! - Error (alias to `error::Error`) — API error response payload.
//! - ErrorCode (alias to `error::ErrorCode`) — stable error identifier.
//! - cache::EnrichmentCache — TTL-bounded single-flight provider cache.
//! - features::SpatialQueryService — validated dataset feature queries.
//! - enrichment::EnrichmentService — combined point enrichment.

pub mod cache;
pub mod datasets;
pub mod enrichment;
pub mod error;
pub mod features;
pub mod geo;
pub mod ports;
pub mod sanitize;

pub use self::error::{Error, ErrorCode, ErrorValidationError};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::invalid_request("bbox fields must be numeric"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
