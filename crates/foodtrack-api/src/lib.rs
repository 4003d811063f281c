//! JSON/SSE HTTP layer for Foodtrack.
//!
//! Exposes an axum [`Router`] over an [`OrderTracker`] backed by any
//! [`TrackingStore`]. Every request carries an explicit [`auth::Session`].

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use foodtrack_core::{policy::TransitionPolicy, store::TrackingStore};
use foodtrack_tracker::{ContactSealer, OrderTracker, RiderLocator};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
use handlers::{contacts, events, orders, riders, timeline};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_sweep_interval() -> u64 { 60 }

/// Runtime server configuration, deserialised from `config.toml` and
/// `FOODTRACK_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  pub admin_username:      String,
  pub admin_password_hash: String,
  /// 64 hex characters. When absent a random key is used and contacts do not
  /// survive a restart.
  #[serde(default)]
  pub contacts_master_key: Option<String>,
  #[serde(default = "default_sweep_interval")]
  pub sweep_interval_secs: u64,
  #[serde(default)]
  pub transition_policy:   TransitionPolicy,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub tracker: OrderTracker<S>,
  pub riders:  RiderLocator<S>,
  pub auth:    Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      tracker: self.tracker.clone(),
      riders:  self.riders.clone(),
      auth:    Arc::clone(&self.auth),
    }
  }
}

impl<S> AppState<S>
where
  S: TrackingStore + 'static,
{
  pub fn new(store: Arc<S>, sealer: Arc<ContactSealer>, auth: AuthConfig) -> Self {
    Self {
      riders:  RiderLocator::new(Arc::clone(&store)),
      tracker: OrderTracker::new(store, sealer),
      auth:    Arc::new(auth),
    }
  }

  pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
    self.tracker = self.tracker.with_policy(policy);
    self
  }

  pub fn store(&self) -> &Arc<S> { self.tracker.store() }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: TrackingStore + 'static,
{
  Router::new()
    // Orders and status
    .route("/orders", post(orders::create::<S>))
    .route("/orders/{id}", get(orders::get_one::<S>))
    .route("/orders/{id}/rider", put(orders::assign_rider::<S>))
    .route("/orders/{id}/tracking", get(orders::tracking::<S>))
    .route("/orders/{id}/status", post(orders::update_status::<S>))
    .route("/orders/{id}/events", get(events::stream::<S>))
    // Contacts
    .route("/orders/{id}/contacts", get(contacts::get_one::<S>))
    .route("/orders/{id}/contacts/access-log", get(contacts::access_log::<S>))
    // Timeline
    .route("/orders/{id}/timeline", get(timeline::list::<S>).post(timeline::create::<S>))
    // Riders
    .route("/riders/nearby", get(riders::nearby::<S>))
    .route("/riders/{id}/location", put(riders::record_location::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
