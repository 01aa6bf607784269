//! Open-Meteo outbound adapter.
//!
//! Implements the `WeatherSource` port over the Open-Meteo archive API:
//! request construction, HTTP error mapping, and normalisation of the
//! column-oriented daily arrays into one row per date.

mod dto;
mod http_source;

pub use http_source::OpenMeteoHttpSource;
