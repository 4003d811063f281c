//! Order tracking records and their append-only status history.
//!
//! A tracking record is created when an order is placed and is never deleted.
//! Its `current_status` is always the `new_status` of the last history entry,
//! or [`OrderStatus::INITIAL`] while the history is empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{role::Role, status::OrderStatus};

// ─── History ─────────────────────────────────────────────────────────────────

/// One validated transition. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
  pub previous_status: OrderStatus,
  pub new_status:      OrderStatus,
  pub timestamp:       DateTime<Utc>,
  pub updated_by:      Role,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes:           Option<String>,
}

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTracking {
  pub order_id:       Uuid,
  pub current_status: OrderStatus,
  pub status_history: Vec<StatusChange>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl OrderTracking {
  /// A fresh record in the initial status with an empty history.
  pub fn new(order_id: Uuid, at: DateTime<Utc>) -> Self {
    Self {
      order_id,
      current_status: OrderStatus::INITIAL,
      status_history: Vec::new(),
      created_at: at,
      updated_at: at,
    }
  }

  /// Whether `current_status` agrees with the tail of the history.
  pub fn is_consistent(&self) -> bool {
    let expected = self
      .status_history
      .last()
      .map_or(OrderStatus::INITIAL, |c| c.new_status);
    self.current_status == expected
  }
}

// ─── Broadcast payload ───────────────────────────────────────────────────────

/// The `status_update` event pushed to subscribers of an order's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
  pub order_id:   Uuid,
  pub status:     OrderStatus,
  pub updated_by: Role,
  pub timestamp:  DateTime<Utc>,
}

impl StatusUpdate {
  /// Name of the per-order channel, `order:{order_id}`.
  pub fn channel(order_id: Uuid) -> String { format!("order:{order_id}") }
}

impl From<(Uuid, &StatusChange)> for StatusUpdate {
  fn from((order_id, change): (Uuid, &StatusChange)) -> Self {
    Self {
      order_id,
      status: change.new_status,
      updated_by: change.updated_by,
      timestamp: change.timestamp,
    }
  }
}
