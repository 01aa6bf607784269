//! HTTP inbound adapter exposing REST endpoints.

pub mod datasets;
pub mod enrich;
pub mod error;
pub mod health;
pub mod state;
#[cfg(test)]
pub mod test_support;

pub use error::ApiResult;
