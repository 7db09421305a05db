use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeliveryStatus, ShipmentError};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, ShipmentError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ShipmentError::InvalidLocation("latitude must be within [-90, 90]"));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ShipmentError::InvalidLocation(
                "longitude must be within [-180, 180]",
            ));
        }
        Ok(Self { lat, lon })
    }

    /// Builds a point from optional request fields; both or neither.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Self>, ShipmentError> {
        match (lat, lon) {
            (Some(lat), Some(lon)) => Self::new(lat, lon).map(Some),
            (None, None) => Ok(None),
            _ => Err(ShipmentError::InvalidLocation(
                "latitude and longitude must be given together",
            )),
        }
    }
}

/// Proof attached to a delivered or failed shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Where the stored photo can be fetched.
    pub url: String,
    pub receiver_name: Option<String>,
    pub note: Option<String>,
}

/// One entry of a shipment's tracking history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub status: DeliveryStatus,
    pub location: Option<GeoPoint>,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TrackingEntry {
    pub fn now(status: DeliveryStatus, location: Option<GeoPoint>, note: Option<String>) -> Self {
        Self {
            status,
            location,
            note,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_ranges() {
        assert!(GeoPoint::new(-33.45, -70.66).is_ok());
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -181.0).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn requires_both_parts() {
        assert!(GeoPoint::from_parts(None, None).unwrap().is_none());
        assert!(GeoPoint::from_parts(Some(1.0), None).is_err());
        assert_eq!(
            GeoPoint::from_parts(Some(1.0), Some(2.0)).unwrap(),
            Some(GeoPoint { lat: 1.0, lon: 2.0 })
        );
    }
}
