//! Error type for the tracking services.

use foodtrack_core::{role::Role, status::OrderStatus};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TrackingError {
  #[error("no tracking record for order {0}")]
  NotFound(Uuid),

  #[error("order not found: {0}")]
  OrderNotFound(Uuid),

  #[error("order {0} is already tracked")]
  AlreadyTracked(Uuid),

  /// The order reached a terminal status before its contacts were stored.
  #[error("order {0} is closed")]
  OrderClosed(Uuid),

  #[error("invalid status transition from {from} to {to}")]
  InvalidTransition { from: OrderStatus, to: OrderStatus },

  /// Another writer moved the order between our read and our write.
  #[error("status changed concurrently: expected {expected}, found {actual}")]
  Conflict { expected: OrderStatus, actual: OrderStatus },

  #[error("role {role} may not move an order to {to}")]
  Forbidden { role: Role, to: OrderStatus },

  #[error("invalid input: {0}")]
  InvalidInput(#[source] foodtrack_core::Error),

  #[error("seal error: {0}")]
  Seal(#[from] crate::seal::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TrackingError {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Whether the caller could succeed by choosing a different target status
  /// or retrying after re-reading the order.
  pub fn is_rejection(&self) -> bool {
    matches!(
      self,
      Self::InvalidTransition { .. } | Self::Conflict { .. } | Self::Forbidden { .. }
    )
  }
}

pub type Result<T, E = TrackingError> = std::result::Result<T, E>;
