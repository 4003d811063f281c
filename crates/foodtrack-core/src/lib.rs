//! Core types and trait definitions for Foodtrack order tracking.
//!
//! This crate is deliberately free of HTTP, database and crypto dependencies.
//! All other crates depend on it; the status machine, role filtering and
//! timeline visibility rules live here so they can be tested without I/O.

pub mod contacts;
pub mod error;
pub mod geo;
pub mod order;
pub mod policy;
pub mod role;
pub mod status;
pub mod store;
pub mod timeline;
pub mod tracking;

pub use error::{Error, Result};
