//! Wire types for follow-prune.
//!
//! This crate contains the serde-serializable shapes exchanged with the
//! browser over the Chrome DevTools Protocol and the JSON payloads returned by
//! the site's private web API. These types represent the "protocol layer" -
//! the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * Lenient: Unknown fields are ignored, optional fields default
//! * Stable: Changes only when the wire format changes
//!
//! Higher-level APIs are built on top of these types in `prune-core`.

pub mod cdp;
pub mod site;

pub use cdp::*;
pub use site::*;
