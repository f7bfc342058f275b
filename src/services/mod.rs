//! Network-facing services
//!
//! Only the HTTP API lives here; everything it calls is owned by
//! [`crate::sentinel::SentinelCore`].

pub mod api;

pub use api::router;
