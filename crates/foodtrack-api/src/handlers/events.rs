//! `GET /orders/{id}/events`: server-sent `status_update` events.
//!
//! Only updates published after the stream opens are delivered. A client that
//! reconnects should re-read `/orders/{id}/tracking` to catch up.

use std::convert::Infallible;

use axum::{
  extract::{Path, State},
  response::sse::{Event, KeepAlive, Sse},
};
use foodtrack_core::store::TrackingStore;
use tokio_stream::{
  Stream, StreamExt as _,
  wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use tracing::debug;
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError};

pub const STATUS_UPDATE_EVENT: &str = "status_update";

pub async fn stream<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError>
where
  S: TrackingStore + 'static,
{
  if state.tracker.get_tracking(id).await?.is_none() {
    return Err(ApiError::NotFound(format!("order {id} not found")));
  }

  let rx = state.tracker.subscribe(id);
  debug!(order_id = %id, actor = %session.actor.id, "status stream opened");

  let events = BroadcastStream::new(rx).filter_map(move |msg| match msg {
    Ok(update) => Event::default()
      .event(STATUS_UPDATE_EVENT)
      .json_data(&update)
      .ok()
      .map(Ok),
    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
      debug!(order_id = %id, skipped, "status stream lagged");
      None
    }
  });

  Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
