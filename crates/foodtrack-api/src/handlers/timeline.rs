//! Handlers for `/orders/{id}/timeline`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/orders/{id}/timeline` | Oldest first; internal events for admins only |
//! | `POST` | `/orders/{id}/timeline` | Body: `{"event_type":"message","event_data":{...}}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use foodtrack_core::{
  store::TrackingStore,
  timeline::{TimelineEvent, TimelineEventType},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError};

fn default_public() -> bool { true }

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub event_type: TimelineEventType,
  #[serde(default)]
  pub event_data: serde_json::Value,
  #[serde(default = "default_public")]
  pub is_public:  bool,
}

/// `GET /orders/{id}/timeline`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimelineEvent>>, ApiError>
where
  S: TrackingStore + 'static,
{
  let events = state.tracker.timeline().get_order_timeline(id, session.role()).await?;
  Ok(Json(events))
}

/// `POST /orders/{id}/timeline`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackingStore + 'static,
{
  if body.event_type == TimelineEventType::StatusChange {
    return Err(ApiError::BadRequest(
      "status_change events are recorded by status updates".into(),
    ));
  }
  if !body.is_public {
    session.require_admin()?;
  }
  if state.tracker.get_tracking(id).await?.is_none() {
    return Err(ApiError::NotFound(format!("order {id} not found")));
  }

  let event = state
    .tracker
    .timeline()
    .add_timeline_event(id, body.event_type, body.event_data, session.actor, body.is_public)
    .await?;
  Ok((StatusCode::CREATED, Json(event)))
}
