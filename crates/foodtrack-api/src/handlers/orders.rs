//! Handlers for `/orders` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/orders` | Body: [`NewOrder`]; starts tracking |
//! | `GET`  | `/orders/{id}` | 404 if not found |
//! | `PUT`  | `/orders/{id}/rider` | Body: [`RiderProfile`] |
//! | `GET`  | `/orders/{id}/tracking` | Status and full history |
//! | `POST` | `/orders/{id}/status` | Body: `{"status":"preparing","notes":null}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use foodtrack_core::{
  order::{NewOrder, Order, RiderProfile},
  role::Role,
  status::OrderStatus,
  store::TrackingStore,
  timeline::TimelineEventType,
  tracking::OrderTracking,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct OrderCreated {
  pub order:    Order,
  pub tracking: OrderTracking,
}

/// `POST /orders`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<NewOrder>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackingStore + 'static,
{
  session.require_any(&[Role::Customer, Role::Admin, Role::System])?;

  let order = body.into_order(Uuid::new_v4(), Utc::now());
  let order = state.store().put_order(order).await.map_err(ApiError::internal)?;
  let tracking = state.tracker.start_tracking(order.order_id).await?;
  info!(order_id = %order.order_id, placed_by = %session.actor.id, "order placed");

  Ok((StatusCode::CREATED, Json(OrderCreated { order, tracking })))
}

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /orders/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError>
where
  S: TrackingStore + 'static,
{
  let order = state
    .store()
    .get_order(id)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;
  Ok(Json(order))
}

/// `GET /orders/{id}/tracking`
pub async fn tracking<S>(
  State(state): State<AppState<S>>,
  _session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<OrderTracking>, ApiError>
where
  S: TrackingStore + 'static,
{
  let tracking = state
    .tracker
    .get_tracking(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;
  Ok(Json(tracking))
}

// ─── Rider assignment ─────────────────────────────────────────────────────────

/// `PUT /orders/{id}/rider`
///
/// Attaches the rider's profile so it can be shared once the order enters
/// `rider_assigned`. Does not change the status.
pub async fn assign_rider<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(rider): Json<RiderProfile>,
) -> Result<Json<Order>, ApiError>
where
  S: TrackingStore + 'static,
{
  session.require_any(&[Role::Restaurant, Role::Rider, Role::Admin, Role::System])?;
  if session.role() == Role::Rider && rider.rider_id != session.actor.id {
    warn!(order_id = %id, actor = %session.actor.id, "rider tried to assign someone else");
    return Err(ApiError::Forbidden("riders may only assign themselves".into()));
  }

  let rider_id = rider.rider_id.clone();
  let order = state
    .store()
    .set_rider(id, rider)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;

  state
    .tracker
    .timeline()
    .add_timeline_event(
      id,
      TimelineEventType::Update,
      json!({ "rider_id": rider_id }),
      session.actor.clone(),
      false,
    )
    .await?;

  Ok(Json(order))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: OrderStatus,
  #[serde(default)]
  pub notes:  Option<String>,
}

/// `POST /orders/{id}/status`
pub async fn update_status<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<OrderTracking>, ApiError>
where
  S: TrackingStore + 'static,
{
  let tracking = state
    .tracker
    .update_status_as(id, body.status, &session.actor, body.notes)
    .await?;
  Ok(Json(tracking))
}
