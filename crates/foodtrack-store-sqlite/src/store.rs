//! The SQLite implementation of [`TrackingStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use foodtrack_core::{
  contacts::{ActiveOrderContacts, ContactAccess},
  geo::{Coordinates, RiderLocation},
  order::{Order, RiderProfile},
  status::OrderStatus,
  store::{TrackingStore, TransitionOutcome},
  timeline::{NewTimelineEvent, TimelineEvent},
  tracking::{OrderTracking, StatusChange},
};

use crate::{
  encode::{
    decode_status, decode_uuid, encode_dt, encode_json, encode_uuid, RawAccess, RawContacts,
    RawOrder, RawRiderLocation, RawStatusChange, RawTimelineEvent, RawTracking,
  },
  schema::SCHEMA,
  Result,
};

// ─── Row readers ─────────────────────────────────────────────────────────────
//
// These run on the connection thread, inside `call` closures, so they take a
// plain `rusqlite::Connection` (a `Transaction` derefs to one).

fn read_order(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawOrder>> {
  conn
    .query_row(
      "SELECT order_id, customer, restaurant, rider, delivery_location, created_at
       FROM orders WHERE order_id = ?1",
      rusqlite::params![id],
      |row| {
        Ok(RawOrder {
          order_id:          row.get(0)?,
          customer:          row.get(1)?,
          restaurant:        row.get(2)?,
          rider:             row.get(3)?,
          delivery_location: row.get(4)?,
          created_at:        row.get(5)?,
        })
      },
    )
    .optional()
}

fn read_tracking(
  conn: &rusqlite::Connection,
  id: &str,
) -> rusqlite::Result<Option<RawTracking>> {
  let head = conn
    .query_row(
      "SELECT order_id, current_status, created_at, updated_at
       FROM order_tracking WHERE order_id = ?1",
      rusqlite::params![id],
      |row| {
        Ok(RawTracking {
          order_id:       row.get(0)?,
          current_status: row.get(1)?,
          created_at:     row.get(2)?,
          updated_at:     row.get(3)?,
          history:        Vec::new(),
        })
      },
    )
    .optional()?;

  let Some(mut tracking) = head else { return Ok(None) };

  let mut stmt = conn.prepare(
    "SELECT previous_status, new_status, timestamp, updated_by, notes
     FROM status_history WHERE order_id = ?1 ORDER BY seq ASC",
  )?;
  tracking.history = stmt
    .query_map(rusqlite::params![id], |row| {
      Ok(RawStatusChange {
        previous_status: row.get(0)?,
        new_status:      row.get(1)?,
        timestamp:       row.get(2)?,
        updated_by:      row.get(3)?,
        notes:           row.get(4)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(Some(tracking))
}

fn read_access_log(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Vec<RawAccess>> {
  let mut stmt = conn.prepare(
    "SELECT order_id, user_id, role, accessed_at
     FROM contact_access_logs WHERE order_id = ?1 ORDER BY seq ASC",
  )?;
  stmt
    .query_map(rusqlite::params![id], |row| {
      Ok(RawAccess {
        order_id:    row.get(0)?,
        user_id:     row.get(1)?,
        role:        row.get(2)?,
        accessed_at: row.get(3)?,
      })
    })?
    .collect()
}

/// What the compare-and-swap closure saw, before decoding.
enum RawOutcome {
  Applied(RawTracking),
  Stale(String),
  Missing,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Foodtrack store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── TrackingStore impl ──────────────────────────────────────────────────────

impl TrackingStore for SqliteStore {
  type Error = crate::Error;

  // ── Orders ────────────────────────────────────────────────────────────────

  async fn put_order(&self, order: Order) -> Result<Order> {
    let id_str         = encode_uuid(order.order_id);
    let customer_str   = encode_json(&order.customer)?;
    let restaurant_str = encode_json(&order.restaurant)?;
    let rider_str      = order.rider.as_ref().map(encode_json).transpose()?;
    let location_str   = order.delivery_location.as_ref().map(encode_json).transpose()?;
    let at_str         = encode_dt(order.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO orders (
             order_id, customer, restaurant, rider, delivery_location, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str,
            customer_str,
            restaurant_str,
            rider_str,
            location_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(order)
  }

  async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    let id_str = encode_uuid(order_id);

    let raw = self
      .conn
      .call(move |conn| Ok(read_order(conn, &id_str)?))
      .await?;

    raw.map(RawOrder::into_order).transpose()
  }

  async fn set_rider(&self, order_id: Uuid, rider: RiderProfile) -> Result<Option<Order>> {
    let id_str    = encode_uuid(order_id);
    let rider_str = encode_json(&rider)?;

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE orders SET rider = ?1 WHERE order_id = ?2",
          rusqlite::params![rider_str, id_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(read_order(conn, &id_str)?)
      })
      .await?;

    raw.map(RawOrder::into_order).transpose()
  }

  // ── Tracking ──────────────────────────────────────────────────────────────

  async fn create_tracking(&self, tracking: OrderTracking) -> Result<bool> {
    let id_str      = encode_uuid(tracking.order_id);
    let status_str  = tracking.current_status.as_str();
    let created_str = encode_dt(tracking.created_at);
    let updated_str = encode_dt(tracking.updated_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO order_tracking (order_id, current_status, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, status_str, created_str, updated_str],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(inserted)
  }

  async fn get_tracking(&self, order_id: Uuid) -> Result<Option<OrderTracking>> {
    let id_str = encode_uuid(order_id);

    let raw = self
      .conn
      .call(move |conn| Ok(read_tracking(conn, &id_str)?))
      .await?;

    raw.map(RawTracking::into_tracking).transpose()
  }

  async fn apply_transition(
    &self,
    order_id: Uuid,
    change: StatusChange,
  ) -> Result<TransitionOutcome> {
    let id_str   = encode_uuid(order_id);
    let prev_str = change.previous_status.as_str();
    let next_str = change.new_status.as_str();
    let at_str   = encode_dt(change.timestamp);
    let by_str   = change.updated_by.as_str();
    let notes    = change.notes;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Conditional on the status the caller validated against.
        let updated = tx.execute(
          "UPDATE order_tracking SET current_status = ?1, updated_at = ?2
           WHERE order_id = ?3 AND current_status = ?4",
          rusqlite::params![next_str, at_str, id_str, prev_str],
        )?;

        if updated == 0 {
          let actual: Option<String> = tx
            .query_row(
              "SELECT current_status FROM order_tracking WHERE order_id = ?1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?;
          return Ok(match actual {
            Some(s) => RawOutcome::Stale(s),
            None => RawOutcome::Missing,
          });
        }

        tx.execute(
          "INSERT INTO status_history (
             order_id, previous_status, new_status, timestamp, updated_by, notes
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, prev_str, next_str, at_str, by_str, notes],
        )?;

        let tracking = read_tracking(&tx, &id_str)?;
        tx.commit()?;

        Ok(match tracking {
          Some(t) => RawOutcome::Applied(t),
          None => RawOutcome::Missing,
        })
      })
      .await?;

    Ok(match outcome {
      RawOutcome::Applied(raw) => TransitionOutcome::Applied(raw.into_tracking()?),
      RawOutcome::Stale(actual) => TransitionOutcome::Stale { actual: decode_status(&actual)? },
      RawOutcome::Missing => TransitionOutcome::Missing,
    })
  }

  // ── Active contacts ───────────────────────────────────────────────────────

  async fn put_active_contacts(&self, contacts: ActiveOrderContacts) -> Result<bool> {
    let id_str         = encode_uuid(contacts.order_id);
    let customer_str   = encode_json(&contacts.customer)?;
    let rider_str      = contacts.rider.as_ref().map(encode_json).transpose()?;
    let restaurant_str = encode_json(&contacts.restaurant)?;
    let created_str    = encode_dt(contacts.created_at);
    let expires_str    = encode_dt(contacts.expires_at);
    let key_str        = contacts.encryption_key.0;

    let written = self
      .conn
      .call(move |conn| {
        // One statement, so no transition can commit between the status
        // check and the write.
        let written = conn.execute(
          "INSERT OR REPLACE INTO active_order_contacts (
             order_id, customer, rider, restaurant, created_at, expires_at, encryption_key
           )
           SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
           WHERE NOT EXISTS (
             SELECT 1 FROM order_tracking
             WHERE order_id = ?1 AND current_status IN (?8, ?9)
           )",
          rusqlite::params![
            id_str,
            customer_str,
            rider_str,
            restaurant_str,
            created_str,
            expires_str,
            key_str,
            OrderStatus::Completed.as_str(),
            OrderStatus::Cancelled.as_str(),
          ],
        )?;
        Ok(written > 0)
      })
      .await?;

    Ok(written)
  }

  async fn get_active_contacts(&self, order_id: Uuid) -> Result<Option<ActiveOrderContacts>> {
    let id_str = encode_uuid(order_id);

    let raw = self
      .conn
      .call(move |conn| {
        let contacts = conn
          .query_row(
            "SELECT order_id, customer, rider, restaurant, created_at, expires_at, encryption_key
             FROM active_order_contacts WHERE order_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawContacts {
                order_id:       row.get(0)?,
                customer:       row.get(1)?,
                rider:          row.get(2)?,
                restaurant:     row.get(3)?,
                created_at:     row.get(4)?,
                expires_at:     row.get(5)?,
                encryption_key: row.get(6)?,
              })
            },
          )
          .optional()?;

        let Some(contacts) = contacts else { return Ok(None) };

        // Only the reads made during this bundle's lifetime belong to it.
        let log: Vec<RawAccess> = read_access_log(conn, &id_str)?
          .into_iter()
          .filter(|a| a.accessed_at >= contacts.created_at)
          .collect();

        Ok(Some((contacts, log)))
      })
      .await?;

    raw.map(|(contacts, log)| contacts.into_contacts(log)).transpose()
  }

  async fn delete_active_contacts(&self, order_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(order_id);

    let deleted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM active_order_contacts WHERE order_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(deleted)
  }

  async fn delete_expired_contacts(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
    let now_str = encode_dt(now);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let ids = {
          let mut stmt = tx.prepare(
            "SELECT order_id FROM active_order_contacts WHERE expires_at <= ?1",
          )?;
          stmt
            .query_map(rusqlite::params![now_str], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?
        };
        tx.execute(
          "DELETE FROM active_order_contacts WHERE expires_at <= ?1",
          rusqlite::params![now_str],
        )?;
        tx.commit()?;
        Ok(ids)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn record_contact_access(&self, access: ContactAccess) -> Result<()> {
    let id_str   = encode_uuid(access.order_id);
    let role_str = access.role.as_str();
    let at_str   = encode_dt(access.accessed_at);
    let user_id  = access.user_id;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contact_access_logs (order_id, user_id, role, accessed_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, user_id, role_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn list_contact_access(&self, order_id: Uuid) -> Result<Vec<ContactAccess>> {
    let id_str = encode_uuid(order_id);

    let raws = self
      .conn
      .call(move |conn| Ok(read_access_log(conn, &id_str)?))
      .await?;

    raws.into_iter().map(RawAccess::into_access).collect()
  }

  // ── Timeline ──────────────────────────────────────────────────────────────

  async fn append_timeline_event(&self, input: NewTimelineEvent) -> Result<TimelineEvent> {
    let event = TimelineEvent {
      event_id:   Uuid::new_v4(),
      order_id:   input.order_id,
      event_type: input.event_type,
      event_data: input.event_data,
      timestamp:  Utc::now(),
      actor:      input.actor,
      is_public:  input.is_public,
    };

    let event_id_str = encode_uuid(event.event_id);
    let order_id_str = encode_uuid(event.order_id);
    let type_str     = event.event_type.as_str();
    let data_str     = encode_json(&event.event_data)?;
    let at_str       = encode_dt(event.timestamp);
    let actor_str    = encode_json(&event.actor)?;
    let is_public    = event.is_public;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO order_timeline (
             event_id, order_id, event_type, event_data, timestamp, actor, is_public
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            event_id_str,
            order_id_str,
            type_str,
            data_str,
            at_str,
            actor_str,
            is_public,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(event)
  }

  async fn list_timeline(&self, order_id: Uuid) -> Result<Vec<TimelineEvent>> {
    let id_str = encode_uuid(order_id);

    let raws: Vec<RawTimelineEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, order_id, event_type, event_data, timestamp, actor, is_public
           FROM order_timeline WHERE order_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawTimelineEvent {
              event_id:   row.get(0)?,
              order_id:   row.get(1)?,
              event_type: row.get(2)?,
              event_data: row.get(3)?,
              timestamp:  row.get(4)?,
              actor:      row.get(5)?,
              is_public:  row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTimelineEvent::into_event).collect()
  }

  // ── Rider positions ───────────────────────────────────────────────────────

  async fn record_rider_location(
    &self,
    rider_id: String,
    position: Coordinates,
  ) -> Result<RiderLocation> {
    position.validate()?;

    let location = RiderLocation { rider_id, position, recorded_at: Utc::now() };

    let rider_id = location.rider_id.clone();
    let at_str   = encode_dt(location.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO rider_locations (rider_id, latitude, longitude, recorded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![rider_id, position.latitude, position.longitude, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(location)
  }

  async fn list_rider_locations(&self) -> Result<Vec<RiderLocation>> {
    let raws: Vec<RawRiderLocation> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT rider_id, latitude, longitude, recorded_at FROM rider_locations",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawRiderLocation {
              rider_id:    row.get(0)?,
              latitude:    row.get(1)?,
              longitude:   row.get(2)?,
              recorded_at: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRiderLocation::into_location).collect()
  }
}
