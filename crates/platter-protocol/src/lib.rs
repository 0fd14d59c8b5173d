#![warn(missing_docs)]

//! platter-protocol: integrity primitives and the on-wire frame codec.
//!
//! This crate owns the two pieces every layer above the raw socket agrees
//! on:
//! - `checksum`: Fletcher-32 and the hardware CRC32C path, plus the
//!   selection policy shared by both endpoints
//! - `wire`: the packed little-endian frame header and its pack/parse
//!   helpers with strict validation
//!
//! Frames are the single source of truth for the wire schema; changing the
//! layout is a protocol versioning event.

/// Integrity digests: Fletcher-32 and hardware CRC32C.
pub mod checksum;
/// Frame header layout, flags, and pack/parse.
pub mod wire;
