//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed nanosecond fraction
//! and a `Z` suffix, so string comparison in SQL matches time order. Enum
//! columns use their snake_case names; nested profiles are compact JSON.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use foodtrack_core::{
  contacts::{ActiveOrderContacts, ContactAccess, SealedValue},
  geo::{Coordinates, RiderLocation},
  order::Order,
  role::Role,
  status::OrderStatus,
  timeline::{TimelineEvent, TimelineEventType},
  tracking::{OrderTracking, StatusChange},
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<OrderStatus> { Ok(s.parse()?) }

pub fn decode_role(s: &str) -> Result<Role> { Ok(s.parse()?) }

pub fn decode_event_type(s: &str) -> Result<TimelineEventType> { Ok(s.parse()?) }

// ─── JSON columns ─────────────────────────────────────────────────────────────

pub fn encode_json<T: Serialize>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: DeserializeOwned>(s: &str) -> Result<T> {
  Ok(serde_json::from_str(s)?)
}

fn decode_json_opt<T: DeserializeOwned>(s: Option<String>) -> Result<Option<T>> {
  s.as_deref().map(decode_json).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `orders` row.
pub struct RawOrder {
  pub order_id:          String,
  pub customer:          String,
  pub restaurant:        String,
  pub rider:             Option<String>,
  pub delivery_location: Option<String>,
  pub created_at:        String,
}

impl RawOrder {
  pub fn into_order(self) -> Result<Order> {
    Ok(Order {
      order_id:          decode_uuid(&self.order_id)?,
      customer:          decode_json(&self.customer)?,
      restaurant:        decode_json(&self.restaurant)?,
      rider:             decode_json_opt(self.rider)?,
      delivery_location: decode_json_opt::<Coordinates>(self.delivery_location)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `status_history` row.
pub struct RawStatusChange {
  pub previous_status: String,
  pub new_status:      String,
  pub timestamp:       String,
  pub updated_by:      String,
  pub notes:           Option<String>,
}

impl RawStatusChange {
  pub fn into_change(self) -> Result<StatusChange> {
    Ok(StatusChange {
      previous_status: decode_status(&self.previous_status)?,
      new_status:      decode_status(&self.new_status)?,
      timestamp:       decode_dt(&self.timestamp)?,
      updated_by:      decode_role(&self.updated_by)?,
      notes:           self.notes,
    })
  }
}

/// An `order_tracking` row plus its history rows, oldest first.
pub struct RawTracking {
  pub order_id:       String,
  pub current_status: String,
  pub created_at:     String,
  pub updated_at:     String,
  pub history:        Vec<RawStatusChange>,
}

impl RawTracking {
  pub fn into_tracking(self) -> Result<OrderTracking> {
    Ok(OrderTracking {
      order_id:       decode_uuid(&self.order_id)?,
      current_status: decode_status(&self.current_status)?,
      status_history: self
        .history
        .into_iter()
        .map(RawStatusChange::into_change)
        .collect::<Result<_>>()?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read from a `contact_access_logs` row.
pub struct RawAccess {
  pub order_id:    String,
  pub user_id:     String,
  pub role:        String,
  pub accessed_at: String,
}

impl RawAccess {
  pub fn into_access(self) -> Result<ContactAccess> {
    Ok(ContactAccess {
      order_id:    decode_uuid(&self.order_id)?,
      user_id:     self.user_id,
      role:        decode_role(&self.role)?,
      accessed_at: decode_dt(&self.accessed_at)?,
    })
  }
}

/// Raw strings read from an `active_order_contacts` row.
pub struct RawContacts {
  pub order_id:       String,
  pub customer:       String,
  pub rider:          Option<String>,
  pub restaurant:     String,
  pub created_at:     String,
  pub expires_at:     String,
  pub encryption_key: String,
}

impl RawContacts {
  pub fn into_contacts(self, access_log: Vec<RawAccess>) -> Result<ActiveOrderContacts> {
    Ok(ActiveOrderContacts {
      order_id:       decode_uuid(&self.order_id)?,
      customer:       decode_json(&self.customer)?,
      rider:          decode_json_opt(self.rider)?,
      restaurant:     decode_json(&self.restaurant)?,
      created_at:     decode_dt(&self.created_at)?,
      expires_at:     decode_dt(&self.expires_at)?,
      encryption_key: SealedValue(self.encryption_key),
      access_log:     access_log
        .into_iter()
        .map(RawAccess::into_access)
        .collect::<Result<_>>()?,
    })
  }
}

/// Raw values read from an `order_timeline` row.
pub struct RawTimelineEvent {
  pub event_id:   String,
  pub order_id:   String,
  pub event_type: String,
  pub event_data: String,
  pub timestamp:  String,
  pub actor:      String,
  pub is_public:  bool,
}

impl RawTimelineEvent {
  pub fn into_event(self) -> Result<TimelineEvent> {
    Ok(TimelineEvent {
      event_id:   decode_uuid(&self.event_id)?,
      order_id:   decode_uuid(&self.order_id)?,
      event_type: decode_event_type(&self.event_type)?,
      event_data: decode_json(&self.event_data)?,
      timestamp:  decode_dt(&self.timestamp)?,
      actor:      decode_json(&self.actor)?,
      is_public:  self.is_public,
    })
  }
}

/// Raw values read from a `rider_locations` row.
pub struct RawRiderLocation {
  pub rider_id:    String,
  pub latitude:    f64,
  pub longitude:   f64,
  pub recorded_at: String,
}

impl RawRiderLocation {
  pub fn into_location(self) -> Result<RiderLocation> {
    Ok(RiderLocation {
      rider_id:    self.rider_id,
      position:    Coordinates::new(self.latitude, self.longitude)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
