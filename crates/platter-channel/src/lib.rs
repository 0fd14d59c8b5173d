#![warn(missing_docs)]

//! platter-channel: a controllable lossy layer between the transports and
//! the raw UDP socket.
//!
//! The channel accepts opaque byte buffers and perturbs them on the way
//! out (probabilistic drop, duplication, adjacent reordering, jittered
//! per-frame delay, token-bucket rate limiting) so the reliable
//! transports above it can be stressed reproducibly. Incoming datagrams
//! are delivered unmodified through a timeout-bounded receive.
//!
//! The channel never inspects or rewrites payload bytes, and all
//! impairment draws come from one seeded RNG so a run is reproducible
//! from its seed.

mod channel;

pub use channel::Channel;
