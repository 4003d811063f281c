//! Which roles may move an order into which status.
//!
//! The default policy is open: any role may request any valid transition, and
//! authorization is left to the request layer. Deployments that want the core
//! to enforce it list the permitted roles per target status, e.g.
//!
//! ```toml
//! [transition_policy]
//! restaurant_accepted = ["restaurant", "admin"]
//! picked_up           = ["rider", "admin"]
//! ```
//!
//! Statuses without an entry stay open to every role.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, role::Role, status::OrderStatus};

/// Keys are status strings on the wire so TOML and env sources can supply them.
type RawPolicy = HashMap<String, Vec<Role>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy", into = "RawPolicy")]
pub struct TransitionPolicy {
  allowed: HashMap<OrderStatus, Vec<Role>>,
}

impl TryFrom<RawPolicy> for TransitionPolicy {
  type Error = Error;

  fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
    let allowed = raw
      .into_iter()
      .map(|(status, roles)| Ok((status.parse::<OrderStatus>()?, roles)))
      .collect::<Result<_, Error>>()?;
    Ok(Self { allowed })
  }
}

impl From<TransitionPolicy> for RawPolicy {
  fn from(policy: TransitionPolicy) -> Self {
    policy
      .allowed
      .into_iter()
      .map(|(status, roles)| (status.as_str().to_owned(), roles))
      .collect()
  }
}

impl TransitionPolicy {
  /// The open policy.
  pub fn permissive() -> Self { Self::default() }

  /// Restrict entry into `status` to `roles`.
  pub fn restrict(mut self, status: OrderStatus, roles: impl IntoIterator<Item = Role>) -> Self {
    self.allowed.insert(status, roles.into_iter().collect());
    self
  }

  pub fn permits(&self, role: Role, target: OrderStatus) -> bool {
    self.allowed.get(&target).is_none_or(|roles| roles.contains(&role))
  }
}
