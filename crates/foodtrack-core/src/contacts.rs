//! Active-order contact bundles and their role-filtered views.
//!
//! A bundle exists only while an order has an assigned rider and has not
//! reached a terminal status, and never longer than [`CONTACTS_TTL`]. The
//! customer's phone and address are stored sealed; this module never sees the
//! key, so callers pass an `open` function that reveals a sealed value.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  order::{Order, RestaurantProfile, RiderProfile},
  role::Role,
};

/// How long a bundle stays readable after creation.
pub const CONTACTS_TTL: Duration = Duration::hours(1);

// ─── Stored form ─────────────────────────────────────────────────────────────

/// A value encrypted at rest; opaque to everything but the sealer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedValue(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedCustomerContact {
  pub name:         String,
  pub phone:        SealedValue,
  pub address:      SealedValue,
  pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderContact {
  pub name:    String,
  pub phone:   String,
  pub vehicle: Option<String>,
}

impl From<&RiderProfile> for RiderContact {
  fn from(r: &RiderProfile) -> Self {
    Self { name: r.name.clone(), phone: r.phone.clone(), vehicle: r.vehicle.clone() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantContact {
  pub name:         String,
  pub phone:        String,
  pub address:      String,
  pub instructions: Option<String>,
}

impl From<&RestaurantProfile> for RestaurantContact {
  fn from(r: &RestaurantProfile) -> Self {
    Self {
      name:         r.name.clone(),
      phone:        r.phone.clone(),
      address:      r.address.clone(),
      instructions: r.pickup_instructions.clone(),
    }
  }
}

/// One read of a bundle, kept for audit after the bundle itself is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAccess {
  pub order_id:    Uuid,
  pub user_id:     String,
  pub role:        Role,
  pub accessed_at: DateTime<Utc>,
}

/// The persisted bundle for one active order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveOrderContacts {
  pub order_id:       Uuid,
  pub customer:       SealedCustomerContact,
  pub rider:          Option<RiderContact>,
  pub restaurant:     RestaurantContact,
  pub created_at:     DateTime<Utc>,
  pub expires_at:     DateTime<Utc>,
  /// The record's data key, itself sealed under the master key.
  pub encryption_key: SealedValue,
  pub access_log:     Vec<ContactAccess>,
}

impl ActiveOrderContacts {
  /// Assemble a bundle for `order` whose customer fields are already sealed.
  pub fn assemble(
    order: &Order,
    phone: SealedValue,
    address: SealedValue,
    encryption_key: SealedValue,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      order_id: order.order_id,
      customer: SealedCustomerContact {
        name: order.customer.name.clone(),
        phone,
        address,
        instructions: order.customer.delivery_instructions.clone(),
      },
      rider: order.rider.as_ref().map(RiderContact::from),
      restaurant: RestaurantContact::from(&order.restaurant),
      created_at,
      expires_at: created_at + CONTACTS_TTL,
      encryption_key,
      access_log: Vec::new(),
    }
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }

  /// Project the bundle down to what `role` may see.
  ///
  /// `open` is only invoked for roles entitled to the customer's plaintext
  /// (`rider` and `admin`).
  pub fn view_for<E>(
    &self,
    role: Role,
    mut open: impl FnMut(&SealedValue) -> Result<String, E>,
  ) -> Result<ContactsView, E> {
    let mut view = ContactsView::empty(self.order_id);

    match role {
      Role::Customer => {
        view.rider = self.rider.clone();
        view.restaurant = Some(RestaurantContact {
          phone: String::new(),
          ..self.restaurant.clone()
        });
      }
      Role::Restaurant => {
        view.rider = self.rider.clone();
      }
      Role::Rider => {
        view.customer = Some(self.open_customer(&mut open)?);
        view.restaurant = Some(self.restaurant.clone());
      }
      Role::Admin => {
        view.customer = Some(self.open_customer(&mut open)?);
        view.rider = self.rider.clone();
        view.restaurant = Some(self.restaurant.clone());
      }
      Role::System => {}
    }

    Ok(view)
  }

  fn open_customer<E>(
    &self,
    open: &mut impl FnMut(&SealedValue) -> Result<String, E>,
  ) -> Result<CustomerContact, E> {
    Ok(CustomerContact {
      name:         self.customer.name.clone(),
      phone:        open(&self.customer.phone)?,
      address:      open(&self.customer.address)?,
      instructions: self.customer.instructions.clone(),
    })
  }
}

// ─── Views ───────────────────────────────────────────────────────────────────

/// Customer details with phone and address in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
  pub name:         String,
  pub phone:        String,
  pub address:      String,
  pub instructions: Option<String>,
}

/// What a caller receives; absent sections are omitted from JSON entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactsView {
  pub order_id:   Uuid,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub customer:   Option<CustomerContact>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rider:      Option<RiderContact>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub restaurant: Option<RestaurantContact>,
}

impl ContactsView {
  pub fn empty(order_id: Uuid) -> Self {
    Self { order_id, customer: None, rider: None, restaurant: None }
  }
}
