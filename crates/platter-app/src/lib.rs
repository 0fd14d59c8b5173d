#![warn(missing_docs)]

//! platter-app: the application layer of the demo restaurant.
//!
//! Two deterministic ASCII line formats ride as opaque payloads inside the
//! transport frames:
//!
//! - `ORDER <id> <items>\n`
//! - `REPLY <id> <latency_ms> <items>\n`
//!
//! The codec is strict and failure-returning so malformed payloads never
//! propagate past this boundary; the transports below never inspect or
//! rewrite these bytes. The `cook` module provides the service-time model
//! the demo server uses between an order and its reply.

/// Service-time distributions for the demo kitchen.
pub mod cook;
/// Order and reply line codec.
pub mod order;

pub use cook::{CookDistribution, CookModel};
pub use order::{Order, Reply};
