//! The order status state machine.

use std::sync::Arc;

use chrono::Utc;
use foodtrack_core::{
  policy::TransitionPolicy,
  role::{Actor, Role},
  status::OrderStatus,
  store::{TrackingStore, TransitionOutcome},
  timeline::TimelineEventType,
  tracking::{OrderTracking, StatusChange, StatusUpdate},
};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
  broadcast::{StatusBroadcaster, Subscription},
  contacts::ContactVisibility,
  error::{Result, TrackingError},
  seal::ContactSealer,
  timeline::TimelineLogger,
};

pub struct OrderTracker<S> {
  store:       Arc<S>,
  broadcaster: Arc<StatusBroadcaster>,
  contacts:    ContactVisibility<S>,
  timeline:    TimelineLogger<S>,
  policy:      TransitionPolicy,
}

impl<S> Clone for OrderTracker<S> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      broadcaster: Arc::clone(&self.broadcaster),
      contacts:    self.contacts.clone(),
      timeline:    self.timeline.clone(),
      policy:      self.policy.clone(),
    }
  }
}

impl<S> OrderTracker<S>
where
  S: TrackingStore + 'static,
{
  /// A tracker with the open transition policy and a fresh broadcaster.
  pub fn new(store: Arc<S>, sealer: Arc<ContactSealer>) -> Self {
    Self {
      contacts: ContactVisibility::new(Arc::clone(&store), sealer),
      timeline: TimelineLogger::new(Arc::clone(&store)),
      broadcaster: Arc::new(StatusBroadcaster::default()),
      policy: TransitionPolicy::permissive(),
      store,
    }
  }

  pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_broadcaster(mut self, broadcaster: Arc<StatusBroadcaster>) -> Self {
    self.broadcaster = broadcaster;
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn contacts(&self) -> &ContactVisibility<S> { &self.contacts }

  pub fn timeline(&self) -> &TimelineLogger<S> { &self.timeline }

  pub fn broadcaster(&self) -> &Arc<StatusBroadcaster> { &self.broadcaster }

  pub fn policy(&self) -> &TransitionPolicy { &self.policy }

  /// Create the tracking record for a newly placed order.
  pub async fn start_tracking(&self, order_id: Uuid) -> Result<OrderTracking> {
    let tracking = OrderTracking::new(order_id, Utc::now());
    let created = self
      .store
      .create_tracking(tracking.clone())
      .await
      .map_err(TrackingError::store)?;
    if !created {
      warn!(%order_id, "tracking already started");
      return Err(TrackingError::AlreadyTracked(order_id));
    }
    info!(%order_id, status = %tracking.current_status, "tracking started");
    Ok(tracking)
  }

  pub async fn get_tracking(&self, order_id: Uuid) -> Result<Option<OrderTracking>> {
    self.store.get_tracking(order_id).await.map_err(TrackingError::store)
  }

  /// Move an order to `new_status` on behalf of an anonymous caller in `role`.
  pub async fn update_status(
    &self,
    order_id: Uuid,
    new_status: OrderStatus,
    updated_by: Role,
    notes: Option<String>,
  ) -> Result<OrderTracking> {
    let actor = Actor::new(updated_by.as_str(), updated_by);
    self.update_status_as(order_id, new_status, &actor, notes).await
  }

  /// Validate and apply a transition, then fan it out.
  ///
  /// The transition is committed only if the stored status is still the one
  /// that was validated; a concurrent writer that got there first turns this
  /// call into [`TrackingError::Conflict`]. Once committed, failures in the
  /// side effects are logged and do not fail the call.
  pub async fn update_status_as(
    &self,
    order_id: Uuid,
    new_status: OrderStatus,
    actor: &Actor,
    notes: Option<String>,
  ) -> Result<OrderTracking> {
    let Some(tracking) = self.get_tracking(order_id).await? else {
      warn!(%order_id, "status update for untracked order");
      return Err(TrackingError::NotFound(order_id));
    };
    let from = tracking.current_status;

    if !from.can_transition_to(new_status) {
      warn!(%order_id, %from, to = %new_status, "invalid status transition");
      return Err(TrackingError::InvalidTransition { from, to: new_status });
    }
    if !self.policy.permits(actor.role, new_status) {
      warn!(%order_id, role = %actor.role, to = %new_status, "transition not permitted for role");
      return Err(TrackingError::Forbidden { role: actor.role, to: new_status });
    }

    let change = StatusChange {
      previous_status: from,
      new_status,
      timestamp: Utc::now(),
      updated_by: actor.role,
      notes,
    };
    let updated = match self
      .store
      .apply_transition(order_id, change.clone())
      .await
      .map_err(TrackingError::store)?
    {
      TransitionOutcome::Applied(tracking) => tracking,
      TransitionOutcome::Stale { actual } => {
        warn!(%order_id, expected = %from, %actual, "lost a concurrent status update");
        return Err(TrackingError::Conflict { expected: from, actual });
      }
      TransitionOutcome::Missing => return Err(TrackingError::NotFound(order_id)),
    };

    info!(%order_id, %from, to = %new_status, by = %actor.role, "order status updated");

    let receivers = self.broadcaster.publish(StatusUpdate::from((order_id, &change)));
    debug!(%order_id, receivers, "status update broadcast");

    let event_data = json!({
      "previous_status": change.previous_status,
      "new_status": change.new_status,
      "notes": change.notes,
    });
    if let Err(e) = self
      .timeline
      .add_timeline_event(order_id, TimelineEventType::StatusChange, event_data, actor.clone(), true)
      .await
    {
      error!(%order_id, error = %e, "status change committed but not logged to timeline");
    }

    self.on_enter(order_id, new_status).await;
    Ok(updated)
  }

  /// Side effects of entering `status`.
  async fn on_enter(&self, order_id: Uuid, status: OrderStatus) {
    let result = match status {
      OrderStatus::RiderAssigned => self
        .contacts
        .create_active_order_contacts(order_id)
        .await
        .map(|c| json!({ "contacts": "shared", "expires_at": c.expires_at })),
      OrderStatus::Completed | OrderStatus::Cancelled => self
        .contacts
        .remove_active_order_contacts(order_id)
        .await
        .map(|removed| json!({ "contacts": "revoked", "removed": removed })),
      other => {
        debug!(%order_id, status = %other, "no side effects for status");
        return;
      }
    };

    match result {
      Ok(event_data) => {
        let logged = self
          .timeline
          .add_timeline_event(order_id, TimelineEventType::Update, event_data, Actor::system(), false)
          .await;
        if let Err(e) = logged {
          warn!(%order_id, error = %e, "failed to log contact side effect");
        }
      }
      // A terminal update overtook this one; its removal already ran.
      Err(TrackingError::OrderClosed(_)) => {
        debug!(%order_id, %status, "contacts not shared for closed order")
      }
      Err(e) => error!(%order_id, %status, error = %e, "contact side effect failed"),
    }
  }

  /// Receive status updates for `order_id` published from now on.
  pub fn subscribe(&self, order_id: Uuid) -> broadcast::Receiver<StatusUpdate> {
    self.broadcaster.subscribe(order_id)
  }

  /// Callback form of [`OrderTracker::subscribe`].
  pub fn subscribe_with<F>(&self, order_id: Uuid, on_update: F) -> Subscription
  where
    F: FnMut(StatusUpdate) + Send + 'static,
  {
    self.broadcaster.subscribe_with(order_id, on_update)
  }
}
