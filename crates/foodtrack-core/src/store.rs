//! The `TrackingStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `foodtrack-store-sqlite`).
//! The tracking services depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  contacts::{ActiveOrderContacts, ContactAccess},
  geo::{Coordinates, RiderLocation},
  order::{Order, RiderProfile},
  timeline::{NewTimelineEvent, TimelineEvent},
  tracking::{OrderTracking, StatusChange},
};

// ─── Conditional update result ───────────────────────────────────────────────

/// Result of [`TrackingStore::apply_transition`].
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
  /// The change was appended and `current_status` updated.
  Applied(OrderTracking),
  /// The record's status no longer matched `previous_status`; nothing was
  /// written.
  Stale { actual: crate::status::OrderStatus },
  /// No tracking record exists for the order.
  Missing,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Foodtrack storage backend.
///
/// Status history, timeline events and contact access logs are append-only.
/// Active contact bundles are the only rows ever deleted.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait TrackingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Orders ────────────────────────────────────────────────────────────

  /// Insert or replace an order.
  fn put_order(
    &self,
    order: Order,
  ) -> impl Future<Output = Result<Order, Self::Error>> + Send + '_;

  /// Retrieve an order by id. Returns `None` if not found.
  fn get_order(
    &self,
    order_id: Uuid,
  ) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send + '_;

  /// Attach a rider to an order. Returns `None` if the order does not exist.
  fn set_rider(
    &self,
    order_id: Uuid,
    rider: RiderProfile,
  ) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send + '_;

  // ── Tracking ──────────────────────────────────────────────────────────

  /// Persist a fresh tracking record. Returns `false` if one already exists
  /// for the order, leaving it untouched.
  fn create_tracking(
    &self,
    tracking: OrderTracking,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Retrieve a tracking record with its full history, oldest change first.
  fn get_tracking(
    &self,
    order_id: Uuid,
  ) -> impl Future<Output = Result<Option<OrderTracking>, Self::Error>> + Send + '_;

  /// Atomically append `change` and set `current_status = change.new_status`,
  /// but only if the stored status still equals `change.previous_status`.
  ///
  /// Validation against the transition table is the caller's job; this is the
  /// compare-and-swap that keeps concurrent writers from both committing.
  fn apply_transition(
    &self,
    order_id: Uuid,
    change: StatusChange,
  ) -> impl Future<Output = Result<TransitionOutcome, Self::Error>> + Send + '_;

  // ── Active contacts ───────────────────────────────────────────────────

  /// Insert or replace the bundle for `contacts.order_id`, unless the order's
  /// tracking record is already in a terminal status. Returns whether the
  /// bundle was written.
  ///
  /// The status check and the write must be atomic with respect to
  /// [`TrackingStore::apply_transition`], so a bundle can never be written
  /// after the order has closed.
  fn put_active_contacts(
    &self,
    contacts: ActiveOrderContacts,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Retrieve a bundle, with `access_log` populated. Expiry is not checked.
  fn get_active_contacts(
    &self,
    order_id: Uuid,
  ) -> impl Future<Output = Result<Option<ActiveOrderContacts>, Self::Error>> + Send + '_;

  /// Delete a bundle. Returns whether a row was removed; a missing bundle is
  /// not an error.
  fn delete_active_contacts(
    &self,
    order_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every bundle with `expires_at <= now` and return their order ids.
  fn delete_expired_contacts(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Append to the contact access audit log.
  fn record_contact_access(
    &self,
    access: ContactAccess,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All access log entries for an order, oldest first. Entries survive
  /// deletion of the bundle.
  fn list_contact_access(
    &self,
    order_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ContactAccess>, Self::Error>> + Send + '_;

  // ── Timeline ──────────────────────────────────────────────────────────

  /// Append an event; the id and timestamp are assigned by the store.
  fn append_timeline_event(
    &self,
    event: NewTimelineEvent,
  ) -> impl Future<Output = Result<TimelineEvent, Self::Error>> + Send + '_;

  /// All events for an order in insertion order, public or not.
  fn list_timeline(
    &self,
    order_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TimelineEvent>, Self::Error>> + Send + '_;

  // ── Rider positions ───────────────────────────────────────────────────

  /// Replace the rider's last known position.
  fn record_rider_location(
    &self,
    rider_id: String,
    position: Coordinates,
  ) -> impl Future<Output = Result<RiderLocation, Self::Error>> + Send + '_;

  /// The latest position of every rider that has reported one.
  fn list_rider_locations(
    &self,
  ) -> impl Future<Output = Result<Vec<RiderLocation>, Self::Error>> + Send + '_;
}
