//! Handlers for `/orders/{id}/contacts`.
//!
//! The response depends on the caller's role; see
//! [`ActiveOrderContacts::view_for`](foodtrack_core::contacts::ActiveOrderContacts::view_for).
//! Every successful read is written to the access log.

use axum::{
  Json,
  extract::{Path, State},
};
use foodtrack_core::{
  contacts::{ContactAccess, ContactsView},
  store::TrackingStore,
};
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError};

/// `GET /orders/{id}/contacts`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<ContactsView>, ApiError>
where
  S: TrackingStore + 'static,
{
  state
    .tracker
    .contacts()
    .get_active_order_contacts(id, &session.actor.id, session.role())
    .await?
    .map(Json)
    .ok_or(ApiError::ContactsUnavailable)
}

/// `GET /orders/{id}/contacts/access-log`, admin only.
pub async fn access_log<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ContactAccess>>, ApiError>
where
  S: TrackingStore + 'static,
{
  session.require_admin()?;
  let log = state.tracker.contacts().contact_access_log(id).await?;
  Ok(Json(log))
}
