//! Overpass outbound adapter.
//!
//! Implements the `RoadMetricsSource` port over the Overpass HTTP API:
//! query construction, retry with jittered backoff, JSON decoding, and
//! aggregation of raw elements into the road/facility metrics payload.

mod dto;
mod http_source;
mod metrics;

pub use http_source::{OverpassHttpIdentity, OverpassHttpSource, RetryPolicy};
