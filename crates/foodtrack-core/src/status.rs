//! The order lifecycle status and its fixed transition table.
//!
//! Orders move forward one step at a time from `order_placed` to `completed`.
//! `cancelled` is reachable from every state up to and including
//! `out_for_delivery`. There are no implicit transitions: anything not listed
//! in [`OrderStatus::allowed_next`] is rejected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Where an order currently is in its lifecycle.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  OrderPlaced,
  PaymentConfirmed,
  RestaurantAccepted,
  Preparing,
  ReadyForPickup,
  RiderAssigned,
  RiderEnRoute,
  PickedUp,
  OutForDelivery,
  Delivered,
  Completed,
  Cancelled,
}

impl OrderStatus {
  /// Every status, in lifecycle order with `cancelled` last.
  pub const ALL: [OrderStatus; 12] = [
    Self::OrderPlaced,
    Self::PaymentConfirmed,
    Self::RestaurantAccepted,
    Self::Preparing,
    Self::ReadyForPickup,
    Self::RiderAssigned,
    Self::RiderEnRoute,
    Self::PickedUp,
    Self::OutForDelivery,
    Self::Delivered,
    Self::Completed,
    Self::Cancelled,
  ];

  /// The status a freshly tracked order starts in.
  pub const INITIAL: OrderStatus = Self::OrderPlaced;

  /// The statuses reachable in one step from `self`.
  pub fn allowed_next(self) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match self {
      OrderPlaced => &[PaymentConfirmed, Cancelled],
      PaymentConfirmed => &[RestaurantAccepted, Cancelled],
      RestaurantAccepted => &[Preparing, Cancelled],
      Preparing => &[ReadyForPickup, Cancelled],
      ReadyForPickup => &[RiderAssigned, Cancelled],
      RiderAssigned => &[RiderEnRoute, Cancelled],
      RiderEnRoute => &[PickedUp, Cancelled],
      PickedUp => &[OutForDelivery, Cancelled],
      OutForDelivery => &[Delivered, Cancelled],
      Delivered => &[Completed],
      Completed | Cancelled => &[],
    }
  }

  pub fn can_transition_to(self, next: OrderStatus) -> bool {
    self.allowed_next().contains(&next)
  }

  /// A terminal status has no outgoing transitions.
  pub fn is_terminal(self) -> bool { self.allowed_next().is_empty() }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::OrderPlaced => "order_placed",
      Self::PaymentConfirmed => "payment_confirmed",
      Self::RestaurantAccepted => "restaurant_accepted",
      Self::Preparing => "preparing",
      Self::ReadyForPickup => "ready_for_pickup",
      Self::RiderAssigned => "rider_assigned",
      Self::RiderEnRoute => "rider_en_route",
      Self::PickedUp => "picked_up",
      Self::OutForDelivery => "out_for_delivery",
      Self::Delivered => "delivered",
      Self::Completed => "completed",
      Self::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| Error::UnknownStatus(s.to_owned()))
  }
}
