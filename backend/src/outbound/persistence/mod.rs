//! PostgreSQL persistence adapters using Diesel.
//!
//! Concrete implementations of the spatial store and enrichment cache ports,
//! backed by PostgreSQL/PostGIS via `diesel-async` with `bb8` pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: implementations only translate between rows and
//!   domain types. No business logic resides here.
//! - **Internal models**: Diesel row structs and schema definitions are
//!   implementation details, never exposed to the domain layer.
//! - **Strongly typed errors**: all database errors are mapped to the port
//!   error types.

pub(crate) mod diesel_helpers;
mod diesel_enrichment_store;
mod models;
mod pool;
mod postgis_spatial_store;
mod schema;

pub use diesel_enrichment_store::DieselEnrichmentStore;
pub use pool::{DbPool, PoolConfig, PoolError};
pub use postgis_spatial_store::PostgisSpatialStore;
