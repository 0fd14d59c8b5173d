#![warn(missing_docs)]

//! Platter: a small public API facade for the workspace.
//!
//! This crate provides a clean, stable surface that re-exports the most
//! commonly used types to run a reliable session over an impaired UDP
//! channel:
//!
//! - Channel and its impairment profile (`Channel`, `ChannelConfig`)
//! - Transports and their contract (`Transport`, `Protocol`, `create`,
//!   `Gbn`, `Sr`, `TransportConfig`)
//! - The demo application codec (`Order`, `Reply`, `CookModel`)
//!
//! Example
//! ```no_run
//! use std::{net::UdpSocket, time::Duration};
//! use platter::{create, Channel, ChannelConfig, Protocol, TransportConfig};
//!
//! let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
//! let peer = "127.0.0.1:7777".parse().unwrap();
//! let channel = Channel::new(socket, peer, ChannelConfig::default()).unwrap();
//! let mut transport = create(Protocol::Gbn, channel, TransportConfig::default());
//!
//! transport.send(b"ORDER 1 burger\n").unwrap();
//! let mut buf = [0u8; 2048];
//! while transport.recv(&mut buf, Duration::from_millis(100)).unwrap().is_none() {}
//! ```

// Core configuration and errors
pub use platter_core::{
    config::{ChannelConfig, TransportConfig},
    constants,
    error::{DecodingErrorKind, ErrorKind, Result},
};
// Channel: impairment layer above the socket
pub use platter_channel::Channel;
// Wire schema, for tools that inspect frames
pub use platter_protocol::{checksum, wire};
// Transports and their shared contract
pub use platter_transport::{create, Gbn, Protocol, Sr, Transport};
// Demo application layer
pub use platter_app::{CookDistribution, CookModel, Order, Reply};

/// Convenience prelude with the most commonly used items.
pub mod prelude {
    pub use crate::{
        create, Channel, ChannelConfig, CookModel, Gbn, Order, Protocol, Reply, Sr, Transport,
        TransportConfig,
    };
}
