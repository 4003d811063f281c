//! Marketplace participants and the actors that act on an order.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The role a caller acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Customer,
  Restaurant,
  Rider,
  Admin,
  /// Automated updates (payment webhooks, timers, sweeps).
  System,
}

impl Role {
  pub const ALL: [Role; 5] = [
    Self::Customer,
    Self::Restaurant,
    Self::Rider,
    Self::Admin,
    Self::System,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Customer => "customer",
      Self::Restaurant => "restaurant",
      Self::Rider => "rider",
      Self::Admin => "admin",
      Self::System => "system",
    }
  }

  pub fn is_admin(self) -> bool { matches!(self, Self::Admin) }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|role| role.as_str() == s)
      .ok_or_else(|| Error::UnknownRole(s.to_owned()))
  }
}

/// Who performed an action, as recorded on timeline events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub id:   String,
  pub role: Role,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

impl Actor {
  pub fn new(id: impl Into<String>, role: Role) -> Self {
    Self { id: id.into(), role, name: None }
  }

  /// The actor used for automated side effects.
  pub fn system() -> Self { Self::new("system", Role::System) }
}
