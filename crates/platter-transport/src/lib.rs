#![warn(missing_docs)]

//! platter-transport: reliable ARQ transports above the impairment channel.
//!
//! Two implementations share the [`Transport`] contract:
//! - [`Gbn`]: Go-Back-N. Cumulative ACKs, one retransmission timer, and
//!   batch retransmission of the whole outstanding window on expiry. Send
//!   never blocks; liveness is driven from the caller's receive loop.
//! - [`Sr`]: Selective Repeat. Per-sequence timers and a receive-side
//!   reordering ring; only timed-out frames are retransmitted. Send blocks
//!   until the full message is acknowledged.
//!
//! Both fragment application messages into MSS-sized frames, share the
//! wrap-aware sequence arithmetic of `platter-core`, and treat payload
//! bytes as opaque. A transport owns its channel (which owns the socket);
//! dropping the transport releases every buffered payload and queued
//! frame.

use std::{fmt, str::FromStr, time::Duration};

use platter_channel::Channel;
use platter_core::{config::TransportConfig, error::Result};

mod gbn;
mod sr;

pub use gbn::Gbn;
pub use sr::Sr;

/// Receive buffer sized to hold the largest frame the transports emit.
pub(crate) const RECV_BUF: usize = 2048;

/// The contract both ARQ implementations satisfy.
///
/// `send` accepts one application message and fragments it as needed.
/// `recv` returns exactly one delivered in-order payload per call, `None`
/// on timeout (a zero timeout is a single non-blocking poll), and an error
/// only for substrate failures. Out-of-window traffic and malformed frames
/// are handled internally and never surface to the caller.
///
/// Transports are `Send`: a session owns its transport and may live on its
/// own thread, but nothing is shared between sessions.
pub trait Transport: Send {
    /// Sends one application message, fragmenting into MSS-sized frames.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receives one in-order payload, waiting at most `timeout`.
    ///
    /// Payloads longer than `buf` are truncated without signal; size
    /// buffers to the configured MSS.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>>;
}

/// Selects which ARQ policy a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Go-Back-N.
    Gbn,
    /// Selective Repeat.
    Sr,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gbn" => Ok(Protocol::Gbn),
            "sr" => Ok(Protocol::Sr),
            other => Err(format!("unknown protocol '{}', expected gbn or sr", other)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Gbn => write!(f, "gbn"),
            Protocol::Sr => write!(f, "sr"),
        }
    }
}

/// Constructs the chosen transport over `channel`.
///
/// Zero-valued `cfg` fields take the shared defaults; both transports are
/// interchangeable behind the returned trait object.
pub fn create(protocol: Protocol, channel: Channel, cfg: TransportConfig) -> Box<dyn Transport> {
    match protocol {
        Protocol::Gbn => Box::new(Gbn::new(channel, cfg)),
        Protocol::Sr => Box::new(Sr::new(channel, cfg)),
    }
}

/// Packs and transmits a pure ACK frame (`seq = 0`, no DATA flag, empty
/// payload) carrying `ack` through `channel`.
pub(crate) fn send_pure_ack(channel: &mut Channel, ack: u32) -> Result<()> {
    use platter_protocol::wire::{self, FLAG_ACK, HEADER_SIZE};

    let mut buf = [0u8; HEADER_SIZE];
    let n = wire::pack(&mut buf, FLAG_ACK, 0, ack, &[]);
    channel.send(&buf[..n])?;
    Ok(())
}
