//! Geographic primitives shared across the query and enrichment services.
//!
//! All coordinates are WGS84 (EPSG:4326), longitude/latitude order for bbox
//! strings. Validation happens at construction so the services downstream can
//! assume finite, in-range values.

use serde::Serialize;
use utoipa::ToSchema;

use super::error::Error;

/// Mean metres per degree of latitude; good enough for the sub-kilometre
/// envelopes this service derives from point+radius requests.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct GeoPoint {
    /// Latitude in degrees, within [-90, 90].
    pub lat: f64,
    /// Longitude in degrees, within [-180, 180].
    pub lon: f64,
}

impl GeoPoint {
    /// Construct a point, validating coordinate ranges and finiteness.
    ///
    /// # Errors
    ///
    /// Returns [`Error::invalid_request`] for non-finite or out-of-range
    /// coordinates.
    pub fn new(lat: f64, lon: f64) -> Result<Self, Error> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(Error::invalid_request("coordinates must be finite"));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::invalid_request("latitude must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(Error::invalid_request(
                "longitude must be within [-180, 180]",
            ));
        }
        Ok(Self { lat, lon })
    }
}

/// An axis-aligned bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct BBox {
    /// Western edge (minimum longitude).
    pub min_x: f64,
    /// Southern edge (minimum latitude).
    pub min_y: f64,
    /// Eastern edge (maximum longitude).
    pub max_x: f64,
    /// Northern edge (maximum latitude).
    pub max_y: f64,
}

impl BBox {
    /// Construct a bounding box, validating ordering and coordinate ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::invalid_request`] when any edge is non-finite, the
    /// box is inverted or degenerate, or an edge falls outside WGS84 ranges.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, Error> {
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(Error::invalid_request("bbox edges must be finite"));
        }
        if min_x >= max_x || min_y >= max_y {
            return Err(Error::invalid_request(
                "bbox invalid: ensure minx < maxx and miny < maxy",
            ));
        }
        if !(-180.0..=180.0).contains(&min_x) || !(-180.0..=180.0).contains(&max_x) {
            return Err(Error::invalid_request(
                "bbox longitudes must be within [-180, 180]",
            ));
        }
        if !(-90.0..=90.0).contains(&min_y) || !(-90.0..=90.0).contains(&max_y) {
            return Err(Error::invalid_request(
                "bbox latitudes must be within [-90, 90]",
            ));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Parse a bbox from the conventional `minx,miny,maxx,maxy` query string
    /// form (longitude/latitude order).
    ///
    /// # Errors
    ///
    /// Returns [`Error::invalid_request`] when the string does not contain
    /// exactly four numeric fields or the resulting box fails validation.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::geo::BBox;
    ///
    /// let bbox = BBox::parse("23.30,42.65,23.36,42.71").expect("valid bbox");
    /// assert_eq!(bbox.min_x, 23.30);
    /// assert_eq!(bbox.max_y, 42.71);
    /// ```
    pub fn parse(value: &str) -> Result<Self, Error> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::invalid_request("bbox fields must be numeric"))?;
        match parts.as_slice() {
            [min_x, min_y, max_x, max_y] => Self::new(*min_x, *min_y, *max_x, *max_y),
            _ => Err(Error::invalid_request(
                "bbox must have 4 comma-separated values: minx,miny,maxx,maxy",
            )),
        }
    }

    /// Return true when `point` lies inside the box, with `margin_deg`
    /// degrees of slack on every edge.
    pub fn contains_with_margin(&self, lon: f64, lat: f64, margin_deg: f64) -> bool {
        lon >= self.min_x - margin_deg
            && lon <= self.max_x + margin_deg
            && lat >= self.min_y - margin_deg
            && lat <= self.max_y + margin_deg
    }
}

/// Derive an approximate degree envelope around a point.
///
/// The conversion treats one degree of latitude as a constant number of
/// metres and scales longitude by the cosine of the latitude, which is
/// accurate to well under a metre for the radii this service accepts.
///
/// # Errors
///
/// Returns [`Error::invalid_request`] when the radius is not strictly
/// positive or the resulting envelope leaves WGS84 ranges (points near the
/// poles or antimeridian).
pub fn bbox_from_point_radius(point: GeoPoint, radius_m: f64) -> Result<BBox, Error> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(Error::invalid_request("radius_m must be positive"));
    }
    let dlat = radius_m / METRES_PER_DEGREE;
    let dlon = radius_m / (METRES_PER_DEGREE * point.lat.to_radians().cos());
    BBox::new(
        point.lon - dlon,
        point.lat - dlat,
        point.lon + dlon,
        point.lat + dlat,
    )
}

/// Great-circle distance between two points in metres (haversine).
///
/// Used by the road-metrics aggregation to sum way segment lengths without a
/// projection round trip.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}
