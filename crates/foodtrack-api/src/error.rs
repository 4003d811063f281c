//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Messages are meant for end users. Transition rejections deliberately do not
//! reveal the transition table, and contacts that expired look the same as
//! contacts that never existed.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use foodtrack_tracker::TrackingError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const CONTACTS_UNAVAILABLE: &str = "contact details are no longer available for this order";
pub const TRANSITION_REJECTED: &str = "this order cannot be moved to that state right now";

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("contacts unavailable")]
  ContactsUnavailable,

  #[error("transition rejected")]
  TransitionRejected,

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn internal<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Internal(Box::new(e))
  }
}

impl From<TrackingError> for ApiError {
  fn from(e: TrackingError) -> Self {
    match e {
      TrackingError::NotFound(id) | TrackingError::OrderNotFound(id) => {
        Self::NotFound(format!("order {id} not found"))
      }
      TrackingError::AlreadyTracked(id) => Self::Conflict(format!("order {id} is already tracked")),
      TrackingError::OrderClosed(id) => Self::Conflict(format!("order {id} is closed")),
      TrackingError::InvalidTransition { .. } | TrackingError::Conflict { .. } => {
        Self::TransitionRejected
      }
      TrackingError::Forbidden { role, to } => {
        Self::Forbidden(format!("{role} may not move an order to {to}"))
      }
      TrackingError::InvalidInput(e) => Self::BadRequest(e.to_string()),
      e @ (TrackingError::Seal(_) | TrackingError::Store(_)) => Self::internal(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::ContactsUnavailable => (StatusCode::NOT_FOUND, CONTACTS_UNAVAILABLE.to_owned()),
      ApiError::TransitionRejected => (StatusCode::CONFLICT, TRANSITION_REJECTED.to_owned()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Internal(e) => {
        error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"foodtrack\""),
      );
    }
    res
  }
}
