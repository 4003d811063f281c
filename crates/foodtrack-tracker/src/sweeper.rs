//! Periodic removal of expired contact bundles.
//!
//! The per-bundle timers in [`ContactVisibility`] do not survive a restart;
//! this loop is what guarantees a bundle is gone shortly after `expires_at`
//! even if nobody reads it.

use std::time::Duration;

use foodtrack_core::store::TrackingStore;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::contacts::ContactVisibility;

/// Run [`ContactVisibility::sweep_expired_contacts`] every `interval` until the
/// returned handle is aborted. The first sweep runs immediately.
pub fn spawn_expiry_sweeper<S>(contacts: ContactVisibility<S>, interval: Duration) -> JoinHandle<()>
where
  S: TrackingStore + 'static,
{
  let period = interval.max(Duration::from_secs(1));
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = period.as_secs(), "contact expiry sweeper started");

    loop {
      ticker.tick().await;
      match contacts.sweep_expired_contacts().await {
        Ok(removed) if removed.is_empty() => debug!("no expired contacts"),
        Ok(removed) => {
          for order_id in removed {
            debug!(%order_id, "expired contacts removed by sweep");
          }
        }
        Err(e) => warn!(error = %e, "contact expiry sweep failed"),
      }
    }
  })
}
