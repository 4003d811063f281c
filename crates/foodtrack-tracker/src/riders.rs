//! Last known rider positions and proximity search.

use std::sync::Arc;

use foodtrack_core::{
  geo::{Coordinates, DeliveryZone, NearbyRider, RiderLocation, riders_within},
  store::TrackingStore,
};
use tracing::{debug, warn};

use crate::error::{Result, TrackingError};

pub struct RiderLocator<S> {
  store: Arc<S>,
}

impl<S> Clone for RiderLocator<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: TrackingStore> RiderLocator<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn record_location(&self, rider_id: &str, position: Coordinates) -> Result<RiderLocation> {
    if let Err(e) = position.validate() {
      warn!(rider_id, error = %e, "rejected rider position");
      return Err(TrackingError::InvalidInput(e));
    }
    let location = self
      .store
      .record_rider_location(rider_id.to_owned(), position)
      .await
      .map_err(TrackingError::store)?;
    debug!(rider_id, lat = position.latitude, lng = position.longitude, "rider position updated");
    Ok(location)
  }

  /// Riders whose last position lies inside `zone`, nearest first.
  pub async fn riders_within(&self, zone: DeliveryZone) -> Result<Vec<NearbyRider>> {
    zone.center.validate().map_err(TrackingError::InvalidInput)?;
    let locations = self.store.list_rider_locations().await.map_err(TrackingError::store)?;
    Ok(riders_within(&zone, locations))
  }
}
