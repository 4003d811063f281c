//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use foodtrack_core::{
  contacts::{ActiveOrderContacts, ContactAccess, SealedValue},
  geo::Coordinates,
  order::{CustomerProfile, Order, RestaurantProfile, RiderProfile},
  role::{Actor, Role},
  status::OrderStatus,
  store::{TrackingStore, TransitionOutcome},
  timeline::{NewTimelineEvent, TimelineEventType},
  tracking::{OrderTracking, StatusChange},
};
use serde_json::json;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn order() -> Order {
  Order {
    order_id:          Uuid::new_v4(),
    customer:          CustomerProfile {
      customer_id:           "cust-1".into(),
      name:                  "Ada".into(),
      phone:                 "555-0100".into(),
      delivery_address:      "12 Analytical Row".into(),
      delivery_instructions: None,
    },
    restaurant:        RestaurantProfile {
      restaurant_id:       "rest-1".into(),
      name:                "Noodle Bar".into(),
      phone:               "555-0200".into(),
      address:             "1 High St".into(),
      pickup_instructions: None,
      location:            Some(Coordinates::new(51.5, -0.12).unwrap()),
    },
    rider:             None,
    delivery_location: None,
    created_at:        Utc::now(),
  }
}

fn rider() -> RiderProfile {
  RiderProfile {
    rider_id: "rider-1".into(),
    name:     "Sam".into(),
    phone:    "555-0300".into(),
    vehicle:  None,
  }
}

fn change(from: OrderStatus, to: OrderStatus) -> StatusChange {
  StatusChange {
    previous_status: from,
    new_status:      to,
    timestamp:       Utc::now(),
    updated_by:      Role::System,
    notes:           None,
  }
}

// ─── Orders ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_and_get_order() {
  let s = store().await;
  let o = order();

  s.put_order(o.clone()).await.unwrap();
  let fetched = s.get_order(o.order_id).await.unwrap().unwrap();
  assert_eq!(fetched, o);

  assert!(s.get_order(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn set_rider_updates_existing_order_only() {
  let s = store().await;
  let o = s.put_order(order()).await.unwrap();

  let updated = s.set_rider(o.order_id, rider()).await.unwrap().unwrap();
  assert_eq!(updated.rider, Some(rider()));

  assert!(s.set_rider(Uuid::new_v4(), rider()).await.unwrap().is_none());
}

// ─── Tracking ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_tracking_once() {
  let s = store().await;
  let id = Uuid::new_v4();

  assert!(s.create_tracking(OrderTracking::new(id, Utc::now())).await.unwrap());
  assert!(!s.create_tracking(OrderTracking::new(id, Utc::now())).await.unwrap());

  let t = s.get_tracking(id).await.unwrap().unwrap();
  assert_eq!(t.current_status, OrderStatus::OrderPlaced);
  assert!(t.status_history.is_empty());
}

#[tokio::test]
async fn apply_transition_appends_history() {
  let s = store().await;
  let id = Uuid::new_v4();
  s.create_tracking(OrderTracking::new(id, Utc::now())).await.unwrap();

  let mut c = change(OrderStatus::OrderPlaced, OrderStatus::PaymentConfirmed);
  c.notes = Some("card".into());
  let TransitionOutcome::Applied(t) = s.apply_transition(id, c.clone()).await.unwrap() else {
    panic!("expected Applied");
  };
  assert_eq!(t.current_status, OrderStatus::PaymentConfirmed);
  assert_eq!(t.status_history, vec![c]);
  assert!(t.is_consistent());

  s.apply_transition(id, change(OrderStatus::PaymentConfirmed, OrderStatus::RestaurantAccepted))
    .await
    .unwrap();
  let t = s.get_tracking(id).await.unwrap().unwrap();
  assert_eq!(t.status_history.len(), 2);
  assert_eq!(t.status_history[1].new_status, OrderStatus::RestaurantAccepted);
  assert!(t.is_consistent());
}

#[tokio::test]
async fn stale_transition_writes_nothing() {
  let s = store().await;
  let id = Uuid::new_v4();
  s.create_tracking(OrderTracking::new(id, Utc::now())).await.unwrap();

  let outcome = s
    .apply_transition(id, change(OrderStatus::Preparing, OrderStatus::ReadyForPickup))
    .await
    .unwrap();
  assert!(matches!(
    outcome,
    TransitionOutcome::Stale { actual: OrderStatus::OrderPlaced }
  ));

  let t = s.get_tracking(id).await.unwrap().unwrap();
  assert_eq!(t.current_status, OrderStatus::OrderPlaced);
  assert!(t.status_history.is_empty());
}

#[tokio::test]
async fn transition_on_missing_tracking() {
  let s = store().await;
  let outcome = s
    .apply_transition(Uuid::new_v4(), change(OrderStatus::OrderPlaced, OrderStatus::Cancelled))
    .await
    .unwrap();
  assert!(matches!(outcome, TransitionOutcome::Missing));
}

#[tokio::test]
async fn concurrent_transitions_have_one_winner() {
  let s = store().await;
  let id = Uuid::new_v4();
  s.create_tracking(OrderTracking::new(id, Utc::now())).await.unwrap();

  let a = s.apply_transition(id, change(OrderStatus::OrderPlaced, OrderStatus::PaymentConfirmed));
  let b = s.apply_transition(id, change(OrderStatus::OrderPlaced, OrderStatus::Cancelled));
  let (a, b) = tokio::join!(a, b);

  let applied = [a.unwrap(), b.unwrap()]
    .into_iter()
    .filter(|o| matches!(o, TransitionOutcome::Applied(_)))
    .count();
  assert_eq!(applied, 1);

  let t = s.get_tracking(id).await.unwrap().unwrap();
  assert_eq!(t.status_history.len(), 1);
  assert!(matches!(
    t.current_status,
    OrderStatus::PaymentConfirmed | OrderStatus::Cancelled
  ));
  assert!(t.is_consistent());
}

// ─── Active contacts ─────────────────────────────────────────────────────────

fn contacts_for(o: &Order, created_at: chrono::DateTime<Utc>) -> ActiveOrderContacts {
  ActiveOrderContacts::assemble(
    o,
    SealedValue("sealed-phone".into()),
    SealedValue("sealed-address".into()),
    SealedValue("sealed-key".into()),
    created_at,
  )
}

#[tokio::test]
async fn contacts_roundtrip_and_idempotent_delete() {
  let s = store().await;
  let mut o = order();
  o.rider = Some(rider());
  let c = contacts_for(&o, Utc::now());

  s.put_active_contacts(c.clone()).await.unwrap();
  let fetched = s.get_active_contacts(o.order_id).await.unwrap().unwrap();
  assert_eq!(fetched, c);

  assert!(s.delete_active_contacts(o.order_id).await.unwrap());
  assert!(!s.delete_active_contacts(o.order_id).await.unwrap());
  assert!(s.get_active_contacts(o.order_id).await.unwrap().is_none());
}

#[tokio::test]
async fn contacts_are_not_written_for_a_closed_order() {
  let s = store().await;
  let open = order();
  let closed = order();
  for o in [&open, &closed] {
    s.create_tracking(OrderTracking::new(o.order_id, Utc::now())).await.unwrap();
  }
  s.apply_transition(closed.order_id, change(OrderStatus::OrderPlaced, OrderStatus::Cancelled))
    .await
    .unwrap();

  assert!(s.put_active_contacts(contacts_for(&open, Utc::now())).await.unwrap());
  assert!(!s.put_active_contacts(contacts_for(&closed, Utc::now())).await.unwrap());
  assert!(s.get_active_contacts(closed.order_id).await.unwrap().is_none());
}

#[tokio::test]
async fn access_log_attaches_and_survives_deletion() {
  let s = store().await;
  let o = order();
  let created = Utc::now();
  s.put_active_contacts(contacts_for(&o, created)).await.unwrap();

  let access = ContactAccess {
    order_id:    o.order_id,
    user_id:     "rider-1".into(),
    role:        Role::Rider,
    accessed_at: created + Duration::seconds(5),
  };
  s.record_contact_access(access.clone()).await.unwrap();

  let fetched = s.get_active_contacts(o.order_id).await.unwrap().unwrap();
  assert_eq!(fetched.access_log, vec![access.clone()]);

  s.delete_active_contacts(o.order_id).await.unwrap();
  assert_eq!(s.list_contact_access(o.order_id).await.unwrap(), vec![access]);
}

#[tokio::test]
async fn sweep_removes_only_expired() {
  let s = store().await;
  let now = Utc::now();

  let stale = order();
  let fresh = order();
  s.put_active_contacts(contacts_for(&stale, now - Duration::hours(2))).await.unwrap();
  s.put_active_contacts(contacts_for(&fresh, now)).await.unwrap();

  let removed = s.delete_expired_contacts(now).await.unwrap();
  assert_eq!(removed, vec![stale.order_id]);
  assert!(s.get_active_contacts(stale.order_id).await.unwrap().is_none());
  assert!(s.get_active_contacts(fresh.order_id).await.unwrap().is_some());
}

// ─── Timeline ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn timeline_keeps_insertion_order() {
  let s = store().await;
  let id = Uuid::new_v4();

  let first = s
    .append_timeline_event(NewTimelineEvent::new(
      id,
      TimelineEventType::Message,
      json!({ "text": "on my way" }),
      Actor::new("rider-1", Role::Rider),
    ))
    .await
    .unwrap();
  let second = s
    .append_timeline_event(
      NewTimelineEvent::new(
        id,
        TimelineEventType::Issue,
        json!({ "text": "refund requested" }),
        Actor::new("ops", Role::Admin),
      )
      .internal(),
    )
    .await
    .unwrap();

  let events = s.list_timeline(id).await.unwrap();
  assert_eq!(events, vec![first, second]);
  assert!(!events[1].is_public);
  assert!(s.list_timeline(Uuid::new_v4()).await.unwrap().is_empty());
}

// ─── Rider positions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn rider_location_keeps_latest_only() {
  let s = store().await;
  s.record_rider_location("r1".into(), Coordinates::new(1.0, 1.0).unwrap())
    .await
    .unwrap();
  s.record_rider_location("r1".into(), Coordinates::new(2.0, 2.0).unwrap())
    .await
    .unwrap();
  s.record_rider_location("r2".into(), Coordinates::new(3.0, 3.0).unwrap())
    .await
    .unwrap();

  let mut locations = s.list_rider_locations().await.unwrap();
  locations.sort_by(|a, b| a.rider_id.cmp(&b.rider_id));
  assert_eq!(locations.len(), 2);
  assert_eq!(locations[0].position, Coordinates::new(2.0, 2.0).unwrap());
}

#[tokio::test]
async fn rider_location_rejects_bad_coordinates() {
  let s = store().await;
  let bad = Coordinates { latitude: 120.0, longitude: 0.0 };
  assert!(s.record_rider_location("r1".into(), bad).await.is_err());
}
