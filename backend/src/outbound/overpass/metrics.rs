//! Aggregation of raw Overpass elements into the metrics payload.
//!
//! Way lengths are summed segment-by-segment with the haversine formula over
//! the returned way geometry; no projection round trip is involved. Facility
//! elements contribute counts only, so their coordinates are never needed.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::dto::OverpassElementDto;
use crate::domain::geo::{GeoPoint, haversine_m};
use crate::domain::sanitize::finite_number;

/// Road class buckets reported in `road_length_by_class_m`, in output order.
pub(super) const ROAD_CLASSES: [&str; 7] = [
    "motorway",
    "primary",
    "secondary",
    "tertiary",
    "residential",
    "service",
    "other",
];

/// Facility categories reported in `facility_counts`, in output order.
pub(super) const FACILITY_CATEGORIES: [&str; 7] = [
    "amenity",
    "shop",
    "leisure",
    "tourism",
    "public_transport",
    "bus_stop",
    "rail_stop",
];

/// Collapse the long tail of `highway=*` values into a stable bucket set.
fn road_class(highway: &str) -> &'static str {
    match highway {
        "motorway" | "motorway_link" | "trunk" | "trunk_link" => "motorway",
        "primary" | "primary_link" => "primary",
        "secondary" | "secondary_link" => "secondary",
        "tertiary" | "tertiary_link" => "tertiary",
        "residential" | "living_street" | "unclassified" => "residential",
        "service" => "service",
        _ => "other",
    }
}

/// Categorise one facility element, if it is one.
///
/// Stop infrastructure is split out of the generic categories because the
/// same node usually carries both `public_transport=*` and the mode tag.
fn facility_category(tags: &BTreeMap<String, String>) -> Option<&'static str> {
    if tags.get("highway").is_some_and(|v| v == "bus_stop") {
        return Some("bus_stop");
    }
    if tags
        .get("railway")
        .is_some_and(|v| matches!(v.as_str(), "station" | "halt" | "tram_stop"))
    {
        return Some("rail_stop");
    }
    for category in ["amenity", "shop", "leisure", "tourism", "public_transport"] {
        if tags.contains_key(category) {
            return Some(category);
        }
    }
    None
}

fn way_length_m(element: &OverpassElementDto) -> f64 {
    element
        .geometry
        .windows(2)
        .filter_map(|pair| {
            let a = GeoPoint::new(pair[0].lat, pair[0].lon).ok()?;
            let b = GeoPoint::new(pair[1].lat, pair[1].lon).ok()?;
            Some(haversine_m(a, b))
        })
        .sum()
}

/// Sum way lengths per road class across all returned road elements.
pub(super) fn aggregate_roads(elements: &[OverpassElementDto]) -> (f64, BTreeMap<&'static str, f64>) {
    let mut by_class: BTreeMap<&'static str, f64> =
        ROAD_CLASSES.into_iter().map(|class| (class, 0.0)).collect();
    let mut total = 0.0;
    for element in elements {
        if element.element_type != "way" {
            continue;
        }
        let Some(highway) = element.tags.get("highway") else {
            continue;
        };
        let length = way_length_m(element);
        total += length;
        if let Some(bucket) = by_class.get_mut(road_class(highway)) {
            *bucket += length;
        }
    }
    (total, by_class)
}

/// Count facility elements per category.
pub(super) fn aggregate_facilities(
    elements: &[OverpassElementDto],
) -> BTreeMap<&'static str, u64> {
    let mut counts: BTreeMap<&'static str, u64> = FACILITY_CATEGORIES
        .into_iter()
        .map(|category| (category, 0))
        .collect();
    for element in elements {
        if let Some(category) = facility_category(&element.tags)
            && let Some(count) = counts.get_mut(category)
        {
            *count += 1;
        }
    }
    counts
}

/// Assemble the cacheable metrics payload.
pub(super) fn metrics_payload(
    center: GeoPoint,
    radius_m: u32,
    roads: &[OverpassElementDto],
    facilities: &[OverpassElementDto],
) -> Value {
    let (total, by_class) = aggregate_roads(roads);
    let counts = aggregate_facilities(facilities);
    json!({
        "source": "overpass",
        "point": { "lat": finite_number(center.lat), "lon": finite_number(center.lon) },
        "buffer_m": radius_m,
        "road_total_length_m": finite_number(total),
        "road_length_by_class_m": by_class
            .into_iter()
            .map(|(class, length)| (class.to_owned(), finite_number(length)))
            .collect::<serde_json::Map<_, _>>(),
        "facility_counts": counts
            .into_iter()
            .map(|(category, count)| (category.to_owned(), Value::from(count)))
            .collect::<serde_json::Map<_, _>>(),
    })
}
