//! Short-lived contact sharing between the parties of an order.
//!
//! A bundle is removed by whichever comes first: a terminal status, the
//! in-process timer scheduled at creation, the periodic sweep, or the lazy
//! expiry check on read. All four converge on
//! [`ContactVisibility::remove_active_order_contacts`] or the store's expired
//! delete, both of which are idempotent. The store refuses to write a bundle
//! for an order that is already closed, so a terminal update that overtakes
//! `rider_assigned` cannot leave one behind.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use foodtrack_core::{
  contacts::{ActiveOrderContacts, ContactAccess, ContactsView},
  role::Role,
  store::TrackingStore,
};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
  error::{Result, TrackingError},
  seal::{self, ContactSealer},
};

pub struct ContactVisibility<S> {
  store:  Arc<S>,
  sealer: Arc<ContactSealer>,
  /// Pending expiry timers, at most one per order.
  timers: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
}

impl<S> Clone for ContactVisibility<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      sealer: Arc::clone(&self.sealer),
      timers: Arc::clone(&self.timers),
    }
  }
}

impl<S> ContactVisibility<S> {
  fn timers(&self) -> MutexGuard<'_, HashMap<Uuid, AbortHandle>> {
    self.timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Number of expiry timers still waiting to fire.
  pub fn pending_timers(&self) -> usize { self.timers().len() }

  fn cancel_expiry(&self, order_id: Uuid) {
    if let Some(timer) = self.timers().remove(&order_id) {
      timer.abort();
    }
  }

  /// Drop the map entry for `order_id` if it belongs to the calling timer.
  fn release_expiry(&self, order_id: Uuid) {
    let mut timers = self.timers();
    if timers.get(&order_id).is_some_and(|t| t.id() == tokio::task::id()) {
      timers.remove(&order_id);
    }
  }
}

impl<S> ContactVisibility<S>
where
  S: TrackingStore + 'static,
{
  pub fn new(store: Arc<S>, sealer: Arc<ContactSealer>) -> Self {
    Self { store, sealer, timers: Arc::default() }
  }

  /// Build and persist the bundle for `order_id`, then schedule its removal at
  /// `expires_at`. Fails with [`TrackingError::OrderClosed`] if the order has
  /// already been completed or cancelled.
  pub async fn create_active_order_contacts(&self, order_id: Uuid) -> Result<ActiveOrderContacts> {
    let order = self
      .store
      .get_order(order_id)
      .await
      .map_err(TrackingError::store)?
      .ok_or_else(|| {
        error!(%order_id, "cannot share contacts: order not found");
        TrackingError::OrderNotFound(order_id)
      })?;

    if order.rider.is_none() {
      warn!(%order_id, "sharing contacts before a rider is attached to the order");
    }

    let (data_key, wrapped_key) = self.sealer.issue_data_key()?;
    let phone = data_key.seal(&order.customer.phone)?;
    let address = data_key.seal(&order.customer.delivery_address)?;

    let contacts = ActiveOrderContacts::assemble(&order, phone, address, wrapped_key, Utc::now());

    let written = self.store.put_active_contacts(contacts.clone()).await.map_err(|e| {
      error!(%order_id, error = %e, "failed to store active contacts");
      TrackingError::store(e)
    })?;
    if !written {
      info!(%order_id, "order closed before contacts were shared");
      return Err(TrackingError::OrderClosed(order_id));
    }

    info!(%order_id, expires_at = %contacts.expires_at, "active contacts shared");
    self.schedule_expiry(&contacts);
    Ok(contacts)
  }

  /// Best-effort in-process timer; lost on restart, which the sweep covers.
  fn schedule_expiry(&self, contacts: &ActiveOrderContacts) {
    let this = self.clone();
    let order_id = contacts.order_id;
    let delay = (contacts.expires_at - Utc::now()).to_std().unwrap_or_default();

    let timer = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      this.release_expiry(order_id);
      // A newer bundle for the same order may have replaced this one.
      match this.store.get_active_contacts(order_id).await {
        Ok(Some(current)) if current.is_expired(Utc::now()) => {
          if let Err(e) = this.remove_active_order_contacts(order_id).await {
            warn!(%order_id, error = %e, "expiry timer failed to remove contacts");
          }
        }
        Ok(_) => debug!(%order_id, "expiry timer fired; nothing to remove"),
        Err(e) => warn!(%order_id, error = %e, "expiry timer failed to read contacts"),
      }
    });

    if let Some(previous) = self.timers().insert(order_id, timer.abort_handle()) {
      previous.abort();
    }
  }

  /// Read the bundle as `role`. Returns `None` if there is none or it has
  /// expired; an expired bundle is deleted on the way out.
  pub async fn get_active_order_contacts(
    &self,
    order_id: Uuid,
    user_id: &str,
    role: Role,
  ) -> Result<Option<ContactsView>> {
    let Some(contacts) = self
      .store
      .get_active_contacts(order_id)
      .await
      .map_err(TrackingError::store)?
    else {
      return Ok(None);
    };

    let now = Utc::now();
    if contacts.is_expired(now) {
      info!(%order_id, "active contacts expired; removing on read");
      self.remove_active_order_contacts(order_id).await?;
      return Ok(None);
    }

    let data_key = match role {
      Role::Rider | Role::Admin => match self.sealer.unwrap_data_key(&contacts.encryption_key) {
        Ok(key) => Some(key),
        Err(e) => return self.discard_unreadable(order_id, e).await,
      },
      _ => None,
    };
    let view = match contacts.view_for(role, |sealed| match &data_key {
      Some(key) => key.open(sealed),
      None => Err(seal::Error::KeyUnavailable),
    }) {
      Ok(view) => view,
      Err(e) => return self.discard_unreadable(order_id, e).await,
    };

    let access = ContactAccess {
      order_id,
      user_id: user_id.to_owned(),
      role,
      accessed_at: now,
    };
    self.store.record_contact_access(access).await.map_err(|e| {
      error!(%order_id, user_id, %role, error = %e, "failed to log contact access");
      TrackingError::store(e)
    })?;

    Ok(Some(view))
  }

  /// A bundle sealed under a master key this process no longer holds can
  /// never be opened again.
  async fn discard_unreadable(
    &self,
    order_id: Uuid,
    cause: seal::Error,
  ) -> Result<Option<ContactsView>> {
    warn!(%order_id, error = %cause, "active contacts cannot be decrypted; removing");
    self.remove_active_order_contacts(order_id).await?;
    Ok(None)
  }

  /// Delete the bundle if present. Returns whether anything was removed.
  pub async fn remove_active_order_contacts(&self, order_id: Uuid) -> Result<bool> {
    let removed = self.store.delete_active_contacts(order_id).await.map_err(|e| {
      error!(%order_id, error = %e, "failed to remove active contacts");
      TrackingError::store(e)
    })?;
    self.cancel_expiry(order_id);
    if removed {
      info!(%order_id, "active contacts removed");
    }
    Ok(removed)
  }

  /// Delete every bundle past its expiry and return the affected orders.
  pub async fn sweep_expired_contacts(&self) -> Result<Vec<Uuid>> {
    let removed = self
      .store
      .delete_expired_contacts(Utc::now())
      .await
      .map_err(TrackingError::store)?;
    if !removed.is_empty() {
      info!(count = removed.len(), "swept expired active contacts");
    }
    Ok(removed)
  }

  /// Audit entries for an order, including reads of bundles since removed.
  pub async fn contact_access_log(&self, order_id: Uuid) -> Result<Vec<ContactAccess>> {
    self
      .store
      .list_contact_access(order_id)
      .await
      .map_err(TrackingError::store)
  }
}
