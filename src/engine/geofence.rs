use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers, as used by the training-side rule.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated GPS position. Construction rejects NaN and out-of-range
/// coordinates so the distance math never sees them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeofenceError> {
        if !latitude.is_finite() || latitude.abs() > 90.0 {
            return Err(GeofenceError::InvalidCoordinate {
                axis: "latitude",
                value: latitude,
            });
        }
        if !longitude.is_finite() || longitude.abs() > 180.0 {
            return Err(GeofenceError::InvalidCoordinate {
                axis: "longitude",
                value: longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Great-circle distance between two points via the haversine formula.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// A fixed geofenced point with its trigger radius and the suggestion copy it
/// emits. Modeled as data so additional targets stay a configuration change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceTarget {
    pub location_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub message: String,
}

impl GeofenceTarget {
    /// Saudi side of King Fahd Causeway, the single target in production.
    pub fn king_fahd_causeway() -> Self {
        Self {
            location_type: "king_fahd_causeway".to_string(),
            latitude: 26.2285,
            longitude: 50.2163,
            radius_km: 10.0,
            message: "You are near King Fahd Causeway. \
                      You can pay border/customs fees for your vehicle now."
                .to_string(),
        }
    }

    pub fn center(&self) -> Result<GeoPoint, GeofenceError> {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Whether the point lies inside the fence. The threshold is inclusive.
    pub fn contains(&self, point: GeoPoint) -> Result<bool, GeofenceError> {
        let center = self.center()?;
        Ok(distance_km(point, center) <= self.radius_km)
    }
}

/// Malformed geolocation input. Never fails a whole request; the location
/// suggestion is simply skipped.
#[derive(Debug, thiserror::Error)]
pub enum GeofenceError {
    #[error("{axis} {value} is not a valid coordinate")]
    InvalidCoordinate { axis: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).expect("valid point")
    }

    #[test]
    fn distance_is_symmetric() {
        let riyadh = point(24.7136, 46.6753);
        let dammam = point(26.4207, 50.0888);
        assert_eq!(distance_km(riyadh, dammam), distance_km(dammam, riyadh));
    }

    #[test]
    fn identical_points_are_zero_distance() {
        let here = point(26.2285, 50.2163);
        assert_eq!(distance_km(here, here), 0.0);
    }

    #[test]
    fn antipodal_points_span_half_the_circumference() {
        let a = point(0.0, 0.0);
        let b = point(0.0, 180.0);
        let distance = distance_km(a, b);
        assert!(
            (distance - 20015.0).abs() < 1.0,
            "antipodal distance was {distance}"
        );
    }

    #[test]
    fn known_distance_sanity_check() {
        // Riyadh to Dammam is roughly 355-400 km great-circle.
        let distance = distance_km(point(24.7136, 46.6753), point(26.4207, 50.0888));
        assert!(distance > 300.0 && distance < 450.0, "got {distance}");
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut target = GeofenceTarget::king_fahd_causeway();
        target.radius_km = 0.0;
        let center = target.center().expect("valid center");
        assert!(target.contains(center).expect("evaluates"));
    }

    #[test]
    fn nearby_point_is_inside_distant_point_is_not() {
        let target = GeofenceTarget::king_fahd_causeway();
        assert!(target
            .contains(point(26.23, 50.21))
            .expect("nearby evaluates"));
        assert!(!target
            .contains(point(24.7136, 46.6753))
            .expect("distant evaluates"));
    }

    #[test]
    fn rejects_out_of_range_and_nan_coordinates() {
        assert!(matches!(
            GeoPoint::new(91.0, 0.0),
            Err(GeofenceError::InvalidCoordinate {
                axis: "latitude",
                ..
            })
        ));
        assert!(matches!(
            GeoPoint::new(0.0, 181.0),
            Err(GeofenceError::InvalidCoordinate {
                axis: "longitude",
                ..
            })
        ));
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }
}
