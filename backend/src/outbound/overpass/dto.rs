//! DTOs for decoding Overpass JSON responses.
//!
//! The adapter decodes into these transport DTOs first; aggregation into the
//! metrics payload happens in one pass afterwards.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct OverpassResponseDto {
    #[serde(default)]
    pub(super) elements: Vec<OverpassElementDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OverpassElementDto {
    #[serde(rename = "type")]
    pub(super) element_type: String,
    pub(super) id: i64,
    #[serde(default)]
    pub(super) tags: BTreeMap<String, String>,
    /// Way vertices, present when the query asks for `out geom`.
    #[serde(default)]
    pub(super) geometry: Vec<OverpassVertexDto>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(super) struct OverpassVertexDto {
    pub(super) lat: f64,
    pub(super) lon: f64,
}
