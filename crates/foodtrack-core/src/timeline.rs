//! The per-order activity stream.
//!
//! Events are append-only. Non-public events are an internal audit trail that
//! only admins may read.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  role::{Actor, Role},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
  StatusChange,
  Message,
  Issue,
  Update,
}

impl TimelineEventType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::StatusChange => "status_change",
      Self::Message => "message",
      Self::Issue => "issue",
      Self::Update => "update",
    }
  }
}

impl fmt::Display for TimelineEventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TimelineEventType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "status_change" => Ok(Self::StatusChange),
      "message" => Ok(Self::Message),
      "issue" => Ok(Self::Issue),
      "update" => Ok(Self::Update),
      other => Err(Error::UnknownEventType(other.to_owned())),
    }
  }
}

/// Input for [`TrackingStore::append_timeline_event`](crate::store::TrackingStore::append_timeline_event).
#[derive(Debug, Clone)]
pub struct NewTimelineEvent {
  pub order_id:   Uuid,
  pub event_type: TimelineEventType,
  pub event_data: serde_json::Value,
  pub actor:      Actor,
  pub is_public:  bool,
}

impl NewTimelineEvent {
  /// A public event; use [`NewTimelineEvent::internal`] to hide it.
  pub fn new(
    order_id: Uuid,
    event_type: TimelineEventType,
    event_data: serde_json::Value,
    actor: Actor,
  ) -> Self {
    Self { order_id, event_type, event_data, actor, is_public: true }
  }

  pub fn internal(mut self) -> Self {
    self.is_public = false;
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
  pub event_id:   Uuid,
  pub order_id:   Uuid,
  pub event_type: TimelineEventType,
  pub event_data: serde_json::Value,
  pub timestamp:  DateTime<Utc>,
  pub actor:      Actor,
  pub is_public:  bool,
}

impl TimelineEvent {
  pub fn visible_to(&self, role: Role) -> bool { self.is_public || role.is_admin() }
}

/// Order `events` by timestamp and drop what `role` may not see.
///
/// The sort is stable, so events sharing a timestamp keep insertion order.
pub fn visible_timeline(mut events: Vec<TimelineEvent>, role: Role) -> Vec<TimelineEvent> {
  events.retain(|e| e.visible_to(role));
  events.sort_by_key(|e| e.timestamp);
  events
}
