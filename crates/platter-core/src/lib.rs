#![warn(missing_docs)]

//! platter-core: foundational types and utilities.
//!
//! This crate provides the minimal set of core utilities shared across all
//! layers of the stack:
//! - Configuration types for the channel and the transports
//! - Error handling
//! - Protocol constants
//! - Wrap-aware sequence arithmetic
//! - Deadline timers for retransmission scheduling
//!
//! Protocol-specific logic lives in the specialized crates:
//! - `platter-protocol`: checksums and the binary frame codec
//! - `platter-channel`: the impairment channel above the UDP socket
//! - `platter-transport`: the Go-Back-N and Selective Repeat transports

/// Protocol constants shared across layers.
pub mod constants {
    /// Default send window in frames, applied when the configured value is 0.
    pub const DEFAULT_WINDOW: u32 = 32;
    /// Default maximum segment size (payload bytes per frame) for 0.
    pub const DEFAULT_MSS: u32 = 512;
    /// Default base retransmission timeout in milliseconds for 0.
    pub const DEFAULT_RTO_MS: u32 = 120;
    /// Hard cap on the Selective Repeat window (bounds per-slot state).
    pub const MAX_SR_WINDOW: u32 = 256;
    /// Channel RNG seed substituted when the configured seed is 0.
    pub const DEFAULT_CHANNEL_SEED: u64 = 0xC0FF_EE12_34;
    /// Upper bound on a single application message snapshot (bytes).
    pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
    /// Marker datagram a client sends to seed the server's peer address.
    pub const HELLO: &[u8] = b"HELLO\n";
}

/// Configuration options for the channel and the transports.
pub mod config;
/// Error types and results.
pub mod error;
/// Wrap-aware sequence-number arithmetic.
pub mod seq;
/// Deadline timers driven by caller polling.
pub mod timer;
