//! Geographic helpers for rider positioning.
//!
//! Distances use the haversine formula on a spherical Earth; accurate to well
//! under a percent at city scale, which is all delivery zones need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Coordinates {
  /// Build coordinates, rejecting values outside the WGS84 ranges.
  pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
    let coords = Self { latitude, longitude };
    coords.validate()?;
    Ok(coords)
  }

  pub fn validate(&self) -> Result<()> {
    let lat_ok = (-90.0..=90.0).contains(&self.latitude);
    let lng_ok = (-180.0..=180.0).contains(&self.longitude);
    if lat_ok && lng_ok {
      Ok(())
    } else {
      Err(Error::InvalidCoordinates {
        latitude:  self.latitude,
        longitude: self.longitude,
      })
    }
  }
}

/// Great-circle distance between two points in kilometres.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
  let d_lat = (b.latitude - a.latitude).to_radians();
  let d_lng = (b.longitude - a.longitude).to_radians();
  let lat_a = a.latitude.to_radians();
  let lat_b = b.latitude.to_radians();

  let h = (d_lat / 2.0).sin().powi(2)
    + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// A circular service area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeliveryZone {
  pub center:    Coordinates,
  pub radius_km: f64,
}

impl DeliveryZone {
  pub fn contains(&self, point: Coordinates) -> bool {
    distance_km(self.center, point) <= self.radius_km
  }
}

// ─── Rider positions ─────────────────────────────────────────────────────────

/// The last reported position of a rider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderLocation {
  pub rider_id:    String,
  pub position:    Coordinates,
  pub recorded_at: DateTime<Utc>,
}

/// A rider found inside a zone, with its distance from the zone centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyRider {
  pub location:    RiderLocation,
  pub distance_km: f64,
}

/// Keep the riders inside `zone`, nearest first.
pub fn riders_within(
  zone: &DeliveryZone,
  locations: impl IntoIterator<Item = RiderLocation>,
) -> Vec<NearbyRider> {
  let mut nearby: Vec<NearbyRider> = locations
    .into_iter()
    .map(|location| NearbyRider {
      distance_km: distance_km(zone.center, location.position),
      location,
    })
    .filter(|n| n.distance_km <= zone.radius_km)
    .collect();
  nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
  nearby
}
