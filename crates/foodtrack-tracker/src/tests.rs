//! Service-level tests against an in-memory `SqliteStore`.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use foodtrack_core::{
  contacts::{ActiveOrderContacts, CONTACTS_TTL},
  geo::{Coordinates, DeliveryZone},
  order::{CustomerProfile, Order, RestaurantProfile, RiderProfile},
  policy::TransitionPolicy,
  role::{Actor, Role},
  status::OrderStatus,
  store::TrackingStore,
  timeline::TimelineEventType,
};
use foodtrack_store_sqlite::SqliteStore;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{OrderTracker, RiderLocator, TrackingError, seal::ContactSealer, spawn_expiry_sweeper};

use OrderStatus::*;

const HAPPY_PATH: [OrderStatus; 9] = [
  PaymentConfirmed,
  RestaurantAccepted,
  Preparing,
  ReadyForPickup,
  RiderAssigned,
  RiderEnRoute,
  PickedUp,
  OutForDelivery,
  Delivered,
];

async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
}

async fn tracker() -> OrderTracker<SqliteStore> {
  OrderTracker::new(store().await, Arc::new(ContactSealer::ephemeral()))
}

fn order() -> Order {
  Order {
    order_id:          Uuid::new_v4(),
    customer:          CustomerProfile {
      customer_id:           "cust-1".into(),
      name:                  "Ada".into(),
      phone:                 "555-0100".into(),
      delivery_address:      "12 Analytical Row".into(),
      delivery_instructions: Some("ring twice".into()),
    },
    restaurant:        RestaurantProfile {
      restaurant_id:       "rest-1".into(),
      name:                "Noodle Bar".into(),
      phone:               "555-0200".into(),
      address:             "1 High St".into(),
      pickup_instructions: None,
      location:            None,
    },
    rider:             Some(RiderProfile {
      rider_id: "rider-1".into(),
      name:     "Sam".into(),
      phone:    "555-0300".into(),
      vehicle:  Some("red scooter".into()),
    }),
    delivery_location: None,
    created_at:        Utc::now(),
  }
}

/// Place an order and start tracking it.
async fn placed(t: &OrderTracker<SqliteStore>) -> Uuid {
  let o = order();
  let id = o.order_id;
  t.store().put_order(o).await.unwrap();
  t.start_tracking(id).await.unwrap();
  id
}

/// Walk the happy path up to and including `last`.
async fn advance_to(t: &OrderTracker<SqliteStore>, id: Uuid, last: OrderStatus) {
  for status in HAPPY_PATH {
    t.update_status(id, status, Role::Admin, None).await.unwrap();
    if status == last {
      return;
    }
  }
}

// ─── Status lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn start_tracking_is_once_only() {
  let t = tracker().await;
  let id = placed(&t).await;

  let tracking = t.get_tracking(id).await.unwrap().unwrap();
  assert_eq!(tracking.current_status, OrderPlaced);
  assert!(tracking.status_history.is_empty());

  assert!(matches!(t.start_tracking(id).await, Err(TrackingError::AlreadyTracked(_))));
}

#[tokio::test]
async fn happy_path_builds_history() {
  let t = tracker().await;
  let id = placed(&t).await;

  advance_to(&t, id, Delivered).await;
  let tracking = t.update_status(id, Completed, Role::System, Some("done".into())).await.unwrap();

  assert_eq!(tracking.current_status, Completed);
  assert_eq!(tracking.status_history.len(), 10);
  assert!(tracking.is_consistent());
  let last = tracking.status_history.last().unwrap();
  assert_eq!(last.previous_status, Delivered);
  assert_eq!(last.notes.as_deref(), Some("done"));
}

#[tokio::test]
async fn invalid_transitions_change_nothing() {
  let t = tracker().await;
  let id = placed(&t).await;

  for to in OrderStatus::ALL {
    if OrderPlaced.can_transition_to(to) {
      continue;
    }
    let err = t.update_status(id, to, Role::Admin, None).await.unwrap_err();
    assert!(
      matches!(err, TrackingError::InvalidTransition { from: OrderPlaced, to: got } if got == to),
      "{to}: {err}"
    );
  }

  let tracking = t.get_tracking(id).await.unwrap().unwrap();
  assert_eq!(tracking.current_status, OrderPlaced);
  assert!(tracking.status_history.is_empty());
  assert!(t.timeline().get_order_timeline(id, Role::Admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn skipping_ahead_is_rejected() {
  let t = tracker().await;
  let id = placed(&t).await;

  let err = t.update_status(id, Delivered, Role::Admin, None).await.unwrap_err();
  assert!(err.is_rejection());
  assert_eq!(t.get_tracking(id).await.unwrap().unwrap().current_status, OrderPlaced);
}

#[tokio::test]
async fn terminal_statuses_accept_nothing() {
  let t = tracker().await;
  let id = placed(&t).await;
  t.update_status(id, Cancelled, Role::Customer, None).await.unwrap();

  for to in OrderStatus::ALL {
    assert!(t.update_status(id, to, Role::Admin, None).await.is_err());
  }
}

#[tokio::test]
async fn untracked_order_is_not_found() {
  let t = tracker().await;
  let err = t.update_status(Uuid::new_v4(), PaymentConfirmed, Role::System, None).await;
  assert!(matches!(err, Err(TrackingError::NotFound(_))));
}

#[tokio::test]
async fn concurrent_updates_have_one_winner() {
  let t = tracker().await;
  let id = placed(&t).await;
  advance_to(&t, id, PaymentConfirmed).await;

  // Whichever write lands second either loses the compare-and-swap or, if
  // it re-read first, finds the step already taken.
  let (a, b) = tokio::join!(
    t.update_status(id, RestaurantAccepted, Role::Restaurant, None),
    t.update_status(id, RestaurantAccepted, Role::Admin, None),
  );
  assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1, "{a:?} / {b:?}");
  let loser = a.err().or(b.err()).unwrap();
  assert!(loser.is_rejection(), "{loser}");

  let tracking = t.get_tracking(id).await.unwrap().unwrap();
  assert_eq!(tracking.status_history.len(), 2);
  assert!(tracking.is_consistent());
}

#[tokio::test]
async fn policy_restricts_roles() {
  let policy = TransitionPolicy::permissive().restrict(RestaurantAccepted, [Role::Restaurant]);
  let t = tracker().await.with_policy(policy);
  let id = placed(&t).await;
  advance_to(&t, id, PaymentConfirmed).await;

  let err = t.update_status(id, RestaurantAccepted, Role::Customer, None).await;
  assert!(matches!(
    err,
    Err(TrackingError::Forbidden { role: Role::Customer, to: RestaurantAccepted })
  ));
  t.update_status(id, RestaurantAccepted, Role::Restaurant, None).await.unwrap();
}

// ─── Broadcast ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn subscribers_receive_updates() {
  let t = tracker().await;
  let id = placed(&t).await;
  let mut rx = t.subscribe(id);

  t.update_status(id, PaymentConfirmed, Role::System, None).await.unwrap();
  let update = rx.recv().await.unwrap();
  assert_eq!(update.order_id, id);
  assert_eq!(update.status, PaymentConfirmed);
  assert_eq!(update.updated_by, Role::System);
}

#[tokio::test]
async fn callback_subscription_sees_every_step() {
  let t = tracker().await;
  let id = placed(&t).await;
  let (tx, mut rx) = mpsc::unbounded_channel();
  let _sub = t.subscribe_with(id, move |u| {
    let _ = tx.send(u.status);
  });

  advance_to(&t, id, Preparing).await;
  let mut seen = Vec::new();
  for _ in 0..3 {
    let s = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    seen.push(s);
  }
  assert_eq!(seen, [PaymentConfirmed, RestaurantAccepted, Preparing]);
}

// ─── Timeline ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn status_changes_are_logged_publicly() {
  let t = tracker().await;
  let id = placed(&t).await;
  let actor = Actor::new("ops-7", Role::Admin);
  t.update_status_as(id, PaymentConfirmed, &actor, Some("manual".into())).await.unwrap();

  let events = t.timeline().get_order_timeline(id, Role::Customer).await.unwrap();
  assert_eq!(events.len(), 1);
  let event = &events[0];
  assert_eq!(event.event_type, TimelineEventType::StatusChange);
  assert!(event.is_public);
  assert_eq!(event.actor, actor);
  assert_eq!(event.event_data["previous_status"], json!("order_placed"));
  assert_eq!(event.event_data["new_status"], json!("payment_confirmed"));
  assert_eq!(event.event_data["notes"], json!("manual"));
}

#[tokio::test]
async fn internal_events_are_admin_only() {
  let t = tracker().await;
  let id = placed(&t).await;
  let timeline = t.timeline();

  timeline
    .add_timeline_event(id, TimelineEventType::Message, json!({"text": "on my way"}), Actor::new("rider-1", Role::Rider), true)
    .await
    .unwrap();
  timeline
    .add_timeline_event(id, TimelineEventType::Issue, json!({"text": "refund check"}), Actor::new("ops", Role::Admin), false)
    .await
    .unwrap();

  assert_eq!(timeline.get_order_timeline(id, Role::Customer).await.unwrap().len(), 1);
  assert_eq!(timeline.get_order_timeline(id, Role::Rider).await.unwrap().len(), 1);

  let all = timeline.get_order_timeline(id, Role::Admin).await.unwrap();
  assert_eq!(all.len(), 2);
  assert!(all[0].timestamp <= all[1].timestamp);
  assert_eq!(all[1].event_type, TimelineEventType::Issue);
}

// ─── Contacts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rider_assignment_shares_contacts_for_an_hour() {
  let t = tracker().await;
  let id = placed(&t).await;
  advance_to(&t, id, ReadyForPickup).await;
  assert!(t.store().get_active_contacts(id).await.unwrap().is_none());

  t.update_status(id, RiderAssigned, Role::Admin, None).await.unwrap();
  let stored = t.store().get_active_contacts(id).await.unwrap().unwrap();
  assert_eq!(stored.expires_at - stored.created_at, CONTACTS_TTL);
  assert_ne!(stored.customer.phone.0, "555-0100");
  assert!(!stored.customer.address.0.contains("Analytical"));

  let internal = t.timeline().get_order_timeline(id, Role::Admin).await.unwrap();
  assert!(internal.iter().any(|e| e.event_type == TimelineEventType::Update && !e.is_public));
}

#[tokio::test]
async fn views_follow_role() {
  let t = tracker().await;
  let id = placed(&t).await;
  advance_to(&t, id, RiderAssigned).await;
  let contacts = t.contacts();

  let rider = contacts.get_active_order_contacts(id, "rider-1", Role::Rider).await.unwrap().unwrap();
  let customer = rider.customer.unwrap();
  assert_eq!(customer.phone, "555-0100");
  assert_eq!(customer.address, "12 Analytical Row");
  assert_eq!(customer.instructions.as_deref(), Some("ring twice"));
  assert_eq!(rider.restaurant.unwrap().phone, "555-0200");
  assert!(rider.rider.is_none());

  let cust = contacts.get_active_order_contacts(id, "cust-1", Role::Customer).await.unwrap().unwrap();
  assert!(cust.customer.is_none());
  assert_eq!(cust.rider.unwrap().name, "Sam");
  assert_eq!(cust.restaurant.unwrap().phone, "");

  let rest = contacts.get_active_order_contacts(id, "rest-1", Role::Restaurant).await.unwrap().unwrap();
  assert!(rest.customer.is_none());
  assert!(rest.restaurant.is_none());
  assert_eq!(rest.rider.unwrap().phone, "555-0300");

  let admin = contacts.get_active_order_contacts(id, "ops", Role::Admin).await.unwrap().unwrap();
  assert_eq!(admin.customer.unwrap().phone, "555-0100");
  assert!(admin.rider.is_some() && admin.restaurant.is_some());

  let log = contacts.contact_access_log(id).await.unwrap();
  let who: Vec<_> = log.iter().map(|a| (a.user_id.as_str(), a.role)).collect();
  assert_eq!(
    who,
    [
      ("rider-1", Role::Rider),
      ("cust-1", Role::Customer),
      ("rest-1", Role::Restaurant),
      ("ops", Role::Admin),
    ]
  );
}

#[tokio::test]
async fn terminal_status_revokes_contacts() {
  for terminal in [Completed, Cancelled] {
    let t = tracker().await;
    let id = placed(&t).await;
    advance_to(&t, id, RiderAssigned).await;
    assert!(t.store().get_active_contacts(id).await.unwrap().is_some());

    if terminal == Completed {
      for s in [RiderEnRoute, PickedUp, OutForDelivery, Delivered, Completed] {
        t.update_status(id, s, Role::Admin, None).await.unwrap();
      }
    } else {
      t.update_status(id, Cancelled, Role::Admin, None).await.unwrap();
    }

    assert!(t.store().get_active_contacts(id).await.unwrap().is_none());
    let view = t.contacts().get_active_order_contacts(id, "rider-1", Role::Rider).await.unwrap();
    assert!(view.is_none());
  }
}

#[tokio::test]
async fn closed_order_never_gets_contacts() {
  let t = tracker().await;
  let id = placed(&t).await;
  t.update_status(id, Cancelled, Role::Admin, None).await.unwrap();

  let err = t.contacts().create_active_order_contacts(id).await;
  assert!(matches!(err, Err(TrackingError::OrderClosed(closed)) if closed == id));
  assert!(t.store().get_active_contacts(id).await.unwrap().is_none());
  assert_eq!(t.contacts().pending_timers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_racing_rider_assignment_leaves_no_contacts() {
  let t = tracker().await;

  for spins in 0..200 {
    let id = placed(&t).await;
    advance_to(&t, id, ReadyForPickup).await;

    let assign = tokio::spawn({
      let t = t.clone();
      async move { t.update_status(id, RiderAssigned, Role::Admin, None).await }
    });
    let cancel = tokio::spawn({
      let t = t.clone();
      async move {
        for _ in 0..spins {
          tokio::task::yield_now().await;
        }
        t.update_status(id, Cancelled, Role::Admin, None).await
      }
    });
    let _ = assign.await.unwrap();
    let _ = cancel.await.unwrap();

    let tracking = t.get_tracking(id).await.unwrap().unwrap();
    if tracking.current_status == Cancelled {
      assert!(
        t.store().get_active_contacts(id).await.unwrap().is_none(),
        "contacts survived cancellation after {spins} yields"
      );
    }
  }
}

#[tokio::test]
async fn removal_cancels_the_expiry_timer() {
  let t = tracker().await;
  let id = placed(&t).await;
  advance_to(&t, id, RiderAssigned).await;
  assert_eq!(t.contacts().pending_timers(), 1);

  // Re-sharing replaces the pending timer rather than adding one.
  t.contacts().create_active_order_contacts(id).await.unwrap();
  assert_eq!(t.contacts().pending_timers(), 1);

  t.update_status(id, Cancelled, Role::Admin, None).await.unwrap();
  assert_eq!(t.contacts().pending_timers(), 0);
}

#[tokio::test]
async fn contacts_sealed_under_a_lost_key_are_discarded() {
  let store = store().await;
  let before = OrderTracker::new(Arc::clone(&store), Arc::new(ContactSealer::ephemeral()));
  let id = placed(&before).await;
  advance_to(&before, id, RiderAssigned).await;

  // Same database, new process with a different master key.
  let after = OrderTracker::new(store, Arc::new(ContactSealer::ephemeral()));
  let contacts = after.contacts();

  let cust = contacts.get_active_order_contacts(id, "cust-1", Role::Customer).await.unwrap();
  assert!(cust.is_some());

  let rider = contacts.get_active_order_contacts(id, "rider-1", Role::Rider).await.unwrap();
  assert!(rider.is_none());
  assert!(after.store().get_active_contacts(id).await.unwrap().is_none());

  let log = contacts.contact_access_log(id).await.unwrap();
  assert_eq!(log.len(), 1);
  assert_eq!(log[0].role, Role::Customer);
}

#[tokio::test]
async fn expired_contacts_vanish_on_read() {
  let t = tracker().await;
  let id = placed(&t).await;
  let o = t.store().get_order(id).await.unwrap().unwrap();

  let sealer = ContactSealer::ephemeral();
  let (key, wrapped) = sealer.issue_data_key().unwrap();
  let stale = ActiveOrderContacts::assemble(
    &o,
    key.seal("555-0100").unwrap(),
    key.seal("12 Analytical Row").unwrap(),
    wrapped,
    Utc::now() - CONTACTS_TTL - chrono::Duration::seconds(1),
  );
  t.store().put_active_contacts(stale).await.unwrap();

  let view = t.contacts().get_active_order_contacts(id, "cust-1", Role::Customer).await.unwrap();
  assert!(view.is_none());
  assert!(t.store().get_active_contacts(id).await.unwrap().is_none());
  // Expired reads are not audited.
  assert!(t.contacts().contact_access_log(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_removes_only_expired() {
  let t = tracker().await;
  let fresh = placed(&t).await;
  let old = placed(&t).await;

  t.contacts().create_active_order_contacts(fresh).await.unwrap();
  let mut stale = t.contacts().create_active_order_contacts(old).await.unwrap();
  stale.created_at -= CONTACTS_TTL * 2;
  stale.expires_at -= CONTACTS_TTL * 2;
  t.store().put_active_contacts(stale).await.unwrap();

  let removed = t.contacts().sweep_expired_contacts().await.unwrap();
  assert_eq!(removed, [old]);
  assert!(t.store().get_active_contacts(fresh).await.unwrap().is_some());
  assert!(t.contacts().sweep_expired_contacts().await.unwrap().is_empty());
}

#[tokio::test]
async fn removal_is_idempotent() {
  let t = tracker().await;
  let id = placed(&t).await;
  t.contacts().create_active_order_contacts(id).await.unwrap();

  assert!(t.contacts().remove_active_order_contacts(id).await.unwrap());
  assert!(!t.contacts().remove_active_order_contacts(id).await.unwrap());
  assert!(!t.contacts().remove_active_order_contacts(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn contacts_for_unknown_order_fail() {
  let t = tracker().await;
  let err = t.contacts().create_active_order_contacts(Uuid::new_v4()).await;
  assert!(matches!(err, Err(TrackingError::OrderNotFound(_))));
}

#[tokio::test]
async fn missing_rider_still_shares_customer_and_restaurant() {
  let t = tracker().await;
  let mut o = order();
  o.rider = None;
  let id = o.order_id;
  t.store().put_order(o).await.unwrap();

  let contacts = t.contacts().create_active_order_contacts(id).await.unwrap();
  assert!(contacts.rider.is_none());
  let view = t.contacts().get_active_order_contacts(id, "ops", Role::Admin).await.unwrap().unwrap();
  assert!(view.rider.is_none());
  assert_eq!(view.customer.unwrap().phone, "555-0100");
}

#[tokio::test]
async fn sweeper_removes_due_bundle() {
  let t = tracker().await;
  let id = placed(&t).await;
  let o = t.store().get_order(id).await.unwrap().unwrap();

  // The first sweep runs immediately.
  let sealer = ContactSealer::ephemeral();
  let (key, wrapped) = sealer.issue_data_key().unwrap();
  let due = ActiveOrderContacts::assemble(
    &o,
    key.seal("p").unwrap(),
    key.seal("a").unwrap(),
    wrapped,
    Utc::now() - CONTACTS_TTL,
  );
  t.store().put_active_contacts(due).await.unwrap();

  let handle = spawn_expiry_sweeper(t.contacts().clone(), Duration::from_secs(60));
  for _ in 0..50 {
    if t.store().get_active_contacts(id).await.unwrap().is_none() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
  }
  handle.abort();
  assert!(t.store().get_active_contacts(id).await.unwrap().is_none());
}

// ─── Riders ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn nearby_riders_nearest_first() {
  let locator = RiderLocator::new(store().await);
  let at = |lat, lng| Coordinates::new(lat, lng).unwrap();

  locator.record_location("far", at(51.60, -0.12)).await.unwrap();
  locator.record_location("near", at(51.501, -0.12)).await.unwrap();
  locator.record_location("mid", at(51.52, -0.12)).await.unwrap();

  let zone = DeliveryZone { center: at(51.50, -0.12), radius_km: 5.0 };
  let ids: Vec<_> = locator
    .riders_within(zone)
    .await
    .unwrap()
    .into_iter()
    .map(|n| n.location.rider_id)
    .collect();
  assert_eq!(ids, ["near", "mid"]);

  let bad = Coordinates { latitude: 91.0, longitude: 0.0 };
  assert!(matches!(
    locator.record_location("x", bad).await,
    Err(TrackingError::InvalidInput(_))
  ));
}
