//! Route handlers, one module per resource.

pub mod contacts;
pub mod events;
pub mod orders;
pub mod riders;
pub mod timeline;
