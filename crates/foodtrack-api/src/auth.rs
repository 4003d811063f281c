//! Per-request caller identity.
//!
//! Every endpoint takes a [`Session`]: the caller names itself with the
//! `x-actor-id` and `x-actor-role` headers. The privileged roles (`admin` and
//! `system`) must also present HTTP Basic credentials matching the configured
//! operator account.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use foodtrack_core::role::{Actor, Role};
use foodtrack_core::store::TrackingStore;
use tracing::warn;

use crate::{AppState, error::ApiError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Operator credentials.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Verify HTTP Basic credentials against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val.strip_prefix("Basic ").ok_or(ApiError::Unauthorized)?;
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  if username != config.username {
    return Err(ApiError::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)
}

/// The caller of the current request.
#[derive(Debug, Clone)]
pub struct Session {
  pub actor: Actor,
}

impl Session {
  pub fn role(&self) -> Role { self.actor.role }

  pub fn require_admin(&self) -> Result<(), ApiError> {
    if self.actor.role.is_admin() {
      Ok(())
    } else {
      Err(ApiError::Forbidden("admin only".into()))
    }
  }

  pub fn require_any(&self, roles: &[Role]) -> Result<(), ApiError> {
    if roles.contains(&self.actor.role) {
      Ok(())
    } else {
      Err(ApiError::Forbidden(format!("not available to role {}", self.actor.role)))
    }
  }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|s| !s.is_empty())
}

impl<S> FromRequestParts<AppState<S>> for Session
where
  S: TrackingStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let id = header_str(&parts.headers, ACTOR_ID_HEADER).ok_or(ApiError::Unauthorized)?;
    let role: Role = header_str(&parts.headers, ACTOR_ROLE_HEADER)
      .ok_or(ApiError::Unauthorized)?
      .parse()
      .map_err(|e: foodtrack_core::Error| ApiError::BadRequest(e.to_string()))?;

    if matches!(role, Role::Admin | Role::System) {
      verify_auth(&parts.headers, &state.auth).inspect_err(|_| {
        warn!(actor = id, %role, "privileged session rejected");
      })?;
    }

    Ok(Session { actor: Actor::new(id, role) })
  }
}
