//! Error types for `foodtrack-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown order status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  #[error("unknown timeline event type: {0:?}")]
  UnknownEventType(String),

  #[error("coordinates out of range: ({latitude}, {longitude})")]
  InvalidCoordinates { latitude: f64, longitude: f64 },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
