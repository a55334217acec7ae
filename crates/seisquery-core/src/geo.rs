//! Geographic region filters.
//!
//! All angles are in degrees. Longitudes are in [-180, 180]; a bounding box
//! whose minimum longitude is greater than its maximum wraps across the
//! anti-meridian.

/// Latitude/longitude rectangle. Unset bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lon: Option<f64>,
}

impl BoundingBox {
    /// True when the longitude range wraps across ±180°.
    pub fn crosses_date_line(&self) -> bool {
        matches!((self.min_lon, self.max_lon), (Some(min), Some(max)) if min > max)
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if self.min_lat.is_some_and(|min| lat < min) || self.max_lat.is_some_and(|max| lat > max) {
            return false;
        }
        if self.crosses_date_line() {
            // Both bounds are set when crossing.
            let (min, max) = (self.min_lon.unwrap_or(-180.0), self.max_lon.unwrap_or(180.0));
            return lon >= min || lon <= max;
        }
        !(self.min_lon.is_some_and(|min| lon < min) || self.max_lon.is_some_and(|max| lon > max))
    }
}

/// Ring around a center point, radii given as great-circle degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingCircle {
    pub lat: f64,
    pub lon: f64,
    pub min_radius: Option<f64>,
    pub max_radius: Option<f64>,
}

impl BoundingCircle {
    /// Smallest lat/lon box containing the circle, used as a coarse
    /// prefilter ahead of the exact distance test. Without a maximum radius
    /// the whole globe qualifies.
    pub fn bounding_box(&self) -> BoundingBox {
        let Some(radius) = self.max_radius else {
            return BoundingBox::default();
        };

        let min_lat = self.lat - radius;
        let max_lat = self.lat + radius;

        // A pole inside the circle: every longitude qualifies.
        if min_lat <= -90.0 || max_lat >= 90.0 {
            return BoundingBox {
                min_lat: Some(min_lat.max(-90.0)),
                max_lat: Some(max_lat.min(90.0)),
                min_lon: None,
                max_lon: None,
            };
        }

        let ratio = radius.to_radians().sin() / self.lat.to_radians().cos();
        if ratio >= 1.0 {
            return BoundingBox {
                min_lat: Some(min_lat),
                max_lat: Some(max_lat),
                min_lon: None,
                max_lon: None,
            };
        }

        let half_width = ratio.asin().to_degrees();
        BoundingBox {
            min_lat: Some(min_lat),
            max_lat: Some(max_lat),
            min_lon: Some(wrap_longitude(self.lon - half_width)),
            max_lon: Some(wrap_longitude(self.lon + half_width)),
        }
    }

    pub fn distance_to(&self, lat: f64, lon: f64) -> f64 {
        great_circle_distance(self.lat, self.lon, lat, lon)
    }

    pub fn contains_distance(&self, distance: f64) -> bool {
        !(self.min_radius.is_some_and(|min| distance < min)
            || self.max_radius.is_some_and(|max| distance > max))
    }
}

/// Angular distance in degrees by the spherical law of cosines.
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon1 - lon2).to_radians();
    let cos_d = phi1.cos() * phi2.cos() * dlon.cos() + phi1.sin() * phi2.sin();
    // Rounding can push identical points just above 1.
    cos_d.clamp(-1.0, 1.0).acos().to_degrees()
}

fn wrap_longitude(lon: f64) -> f64 {
    if lon < -180.0 {
        lon + 360.0
    } else if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
