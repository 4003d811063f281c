//! Order tracking services for Foodtrack.
//!
//! [`OrderTracker`] owns the status lifecycle and drives the side effects keyed
//! off it: [`ContactVisibility`] bundles appear when a rider is assigned and
//! disappear on a terminal status, and every change lands on the order's
//! [`TimelineLogger`] stream and [`StatusBroadcaster`] channel.
//!
//! All services are generic over [`foodtrack_core::store::TrackingStore`].

pub mod broadcast;
pub mod contacts;
pub mod error;
pub mod riders;
pub mod seal;
pub mod sweeper;
pub mod timeline;
pub mod tracker;

pub use broadcast::{StatusBroadcaster, Subscription};
pub use contacts::ContactVisibility;
pub use error::TrackingError;
pub use riders::RiderLocator;
pub use seal::ContactSealer;
pub use sweeper::spawn_expiry_sweeper;
pub use timeline::TimelineLogger;
pub use tracker::OrderTracker;

#[cfg(test)]
mod tests;
