//! Per-order realtime status channels.
//!
//! Delivery is fire-and-forget: a subscriber that is not listening, or falls
//! more than the channel capacity behind, misses events and must re-read the
//! tracking record to resynchronise. Nothing is persisted or replayed.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard},
};

use foodtrack_core::tracking::StatusUpdate;
use tokio::{
  sync::broadcast::{self, error::RecvError},
  task::JoinHandle,
};
use tracing::debug;
use uuid::Uuid;

/// Buffered events per order before slow subscribers start skipping.
pub const DEFAULT_CAPACITY: usize = 32;

/// Fan-out of [`StatusUpdate`]s, one channel per order id.
pub struct StatusBroadcaster {
  channels: Mutex<HashMap<Uuid, broadcast::Sender<StatusUpdate>>>,
  capacity: usize,
}

impl Default for StatusBroadcaster {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

impl StatusBroadcaster {
  pub fn new(capacity: usize) -> Self {
    Self { channels: Mutex::new(HashMap::new()), capacity: capacity.max(1) }
  }

  fn channels(&self) -> MutexGuard<'_, HashMap<Uuid, broadcast::Sender<StatusUpdate>>> {
    // The map holds no invariants a panicking holder could break.
    self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Receive every update for `order_id` published from now on.
  pub fn subscribe(&self, order_id: Uuid) -> broadcast::Receiver<StatusUpdate> {
    self
      .channels()
      .entry(order_id)
      .or_insert_with(|| broadcast::channel(self.capacity).0)
      .subscribe()
  }

  /// Invoke `on_update` for each update on `order_id` until the returned
  /// [`Subscription`] is unsubscribed or dropped. Must be called inside a
  /// tokio runtime.
  pub fn subscribe_with<F>(&self, order_id: Uuid, mut on_update: F) -> Subscription
  where
    F: FnMut(StatusUpdate) + Send + 'static,
  {
    let mut rx = self.subscribe(order_id);
    let task = tokio::spawn(async move {
      loop {
        match rx.recv().await {
          Ok(update) => on_update(update),
          Err(RecvError::Lagged(skipped)) => {
            debug!(%order_id, skipped, "subscriber lagged; events dropped");
          }
          Err(RecvError::Closed) => break,
        }
      }
    });
    Subscription { task }
  }

  /// Send `update` to current subscribers of its order and return how many
  /// received it. Channels with no subscribers left are dropped.
  pub fn publish(&self, update: StatusUpdate) -> usize {
    let order_id = update.order_id;
    let mut channels = self.channels();

    let Some(tx) = channels.get(&order_id) else { return 0 };
    match tx.send(update) {
      Ok(n) => n,
      Err(_) => {
        channels.remove(&order_id);
        0
      }
    }
  }

  /// Number of orders with a live channel.
  pub fn channel_count(&self) -> usize { self.channels().len() }
}

/// Handle for a callback subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
  task: JoinHandle<()>,
}

impl Subscription {
  pub fn unsubscribe(self) {}

  pub fn is_active(&self) -> bool { !self.task.is_finished() }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.task.abort(); }
}
