//! Orders and the participant profiles joined onto them.
//!
//! Only the fields the tracking core reads are modelled here: who is involved
//! and how to reach them. Menu items, pricing and payment live elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
  pub customer_id:           String,
  pub name:                  String,
  pub phone:                 String,
  pub delivery_address:      String,
  #[serde(default)]
  pub delivery_instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantProfile {
  pub restaurant_id:       String,
  pub name:                String,
  pub phone:               String,
  pub address:             String,
  #[serde(default)]
  pub pickup_instructions: Option<String>,
  #[serde(default)]
  pub location:            Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderProfile {
  pub rider_id: String,
  pub name:     String,
  pub phone:    String,
  /// Free-form vehicle description, e.g. "red scooter".
  #[serde(default)]
  pub vehicle:  Option<String>,
}

/// An order with its participants. `rider` is `None` until one is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
  pub order_id:          Uuid,
  pub customer:          CustomerProfile,
  pub restaurant:        RestaurantProfile,
  pub rider:             Option<RiderProfile>,
  pub delivery_location: Option<Coordinates>,
  pub created_at:        DateTime<Utc>,
}

/// Input for placing an order; the id and timestamp are assigned on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
  pub customer:          CustomerProfile,
  pub restaurant:        RestaurantProfile,
  #[serde(default)]
  pub rider:             Option<RiderProfile>,
  #[serde(default)]
  pub delivery_location: Option<Coordinates>,
}

impl NewOrder {
  pub fn into_order(self, order_id: Uuid, created_at: DateTime<Utc>) -> Order {
    Order {
      order_id,
      customer: self.customer,
      restaurant: self.restaurant,
      rider: self.rider,
      delivery_location: self.delivery_location,
      created_at,
    }
  }
}
