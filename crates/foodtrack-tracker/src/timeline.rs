//! The order activity stream.

use std::sync::Arc;

use foodtrack_core::{
  role::{Actor, Role},
  store::TrackingStore,
  timeline::{NewTimelineEvent, TimelineEvent, TimelineEventType, visible_timeline},
};
use tracing::error;
use uuid::Uuid;

use crate::error::{Result, TrackingError};

pub struct TimelineLogger<S> {
  store: Arc<S>,
}

impl<S> Clone for TimelineLogger<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: TrackingStore> TimelineLogger<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Append one immutable event. Only fails if the write fails.
  pub async fn add_timeline_event(
    &self,
    order_id: Uuid,
    event_type: TimelineEventType,
    event_data: serde_json::Value,
    actor: Actor,
    is_public: bool,
  ) -> Result<TimelineEvent> {
    let event = NewTimelineEvent { order_id, event_type, event_data, actor, is_public };
    self.store.append_timeline_event(event).await.map_err(|e| {
      error!(%order_id, %event_type, error = %e, "failed to append timeline event");
      TrackingError::store(e)
    })
  }

  /// Events oldest first; only admins see non-public ones.
  pub async fn get_order_timeline(&self, order_id: Uuid, role: Role) -> Result<Vec<TimelineEvent>> {
    let events = self.store.list_timeline(order_id).await.map_err(|e| {
      error!(%order_id, error = %e, "failed to read timeline");
      TrackingError::store(e)
    })?;
    Ok(visible_timeline(events, role))
  }
}
