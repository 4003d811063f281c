//! Handlers for `/riders` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/riders/{id}/location` | Body: `{"latitude":..,"longitude":..}` |
//! | `GET`  | `/riders/nearby` | `?lat=&lng=[&radius_km=5]`, nearest first |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use foodtrack_core::{
  geo::{Coordinates, DeliveryZone, NearbyRider, RiderLocation},
  role::Role,
  store::TrackingStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Session, error::ApiError};

pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// `PUT /riders/{id}/location`
pub async fn record_location<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(rider_id): Path<String>,
  Json(position): Json<Coordinates>,
) -> Result<Json<RiderLocation>, ApiError>
where
  S: TrackingStore + 'static,
{
  match session.role() {
    Role::Rider if session.actor.id == rider_id => {}
    Role::Admin | Role::System => {}
    _ => return Err(ApiError::Forbidden("riders may only report their own position".into())),
  }
  let location = state.riders.record_location(&rider_id, position).await?;
  Ok(Json(location))
}

#[derive(Debug, Deserialize)]
pub struct NearbyParams {
  pub lat:       f64,
  pub lng:       f64,
  pub radius_km: Option<f64>,
}

/// `GET /riders/nearby`
pub async fn nearby<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<NearbyRider>>, ApiError>
where
  S: TrackingStore + 'static,
{
  session.require_any(&[Role::Restaurant, Role::Admin, Role::System])?;

  let radius_km = params.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
  if !radius_km.is_finite() || radius_km <= 0.0 {
    return Err(ApiError::BadRequest("radius_km must be a positive number".into()));
  }
  let center = Coordinates::new(params.lat, params.lng)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let riders = state.riders.riders_within(DeliveryZone { center, radius_km }).await?;
  Ok(Json(riders))
}
