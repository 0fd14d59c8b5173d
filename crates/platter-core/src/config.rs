use std::default::Default;

use crate::constants::{
    DEFAULT_CHANNEL_SEED, DEFAULT_MSS, DEFAULT_RTO_MS, DEFAULT_WINDOW, MAX_SR_WINDOW,
};

/// Impairment profile for a channel instance.
///
/// Percentages are in `[0, 100]`, delays in milliseconds, rate in Mbps.
/// All impairments default to off; the channel then degenerates to a plain
/// datagram pipe.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Probability of silently dropping a datagram at enqueue time.
    pub loss_pct: f64,
    /// Probability of enqueuing a second copy, offset by about 1 ms.
    pub dup_pct: f64,
    /// Probability of swapping the queue head with its successor after enqueue.
    pub reorder_pct: f64,
    /// Base one-way delay added to every frame before it may be transmitted.
    pub delay_mean_ms: f64,
    /// Symmetric jitter amplitude added to the base delay.
    pub delay_jitter_ms: f64,
    /// Token-bucket sender rate limit (0 = unlimited).
    pub rate_mbps: f64,
    /// RNG seed for reproducible impairment draws (0 selects a fixed default).
    pub seed: u64,
    /// Socket receive buffer size in bytes (None = system default).
    pub socket_recv_buffer_size: Option<usize>,
    /// Socket send buffer size in bytes (None = system default).
    pub socket_send_buffer_size: Option<usize>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            loss_pct: 0.0,
            dup_pct: 0.0,
            reorder_pct: 0.0,
            delay_mean_ms: 0.0,
            delay_jitter_ms: 0.0,
            rate_mbps: 0.0,
            seed: 0,
            socket_recv_buffer_size: None,
            socket_send_buffer_size: None,
        }
    }
}

impl ChannelConfig {
    /// Returns the effective RNG seed, substituting the fixed default for 0.
    pub fn effective_seed(&self) -> u64 {
        if self.seed == 0 {
            DEFAULT_CHANNEL_SEED
        } else {
            self.seed
        }
    }
}

/// Configuration for a transport instance (GBN or SR).
///
/// A zero in any sizing field means "use the default": window 32, MSS 512,
/// RTO 120 ms. `resolve` applies those defaults; `resolve_clamped`
/// additionally caps the window for transports with per-slot state.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransportConfig {
    /// Initial sequence number (mod 2^32).
    pub init_seq: u32,
    /// Send window size in frames.
    pub window: u32,
    /// Maximum segment size: payload bytes per frame.
    pub mss: u32,
    /// Base retransmission timeout in milliseconds.
    pub rto_ms: u32,
}

impl TransportConfig {
    /// Applies defaults to zero-valued fields.
    pub fn resolve(mut self) -> Self {
        if self.window == 0 {
            self.window = DEFAULT_WINDOW;
        }
        if self.mss == 0 {
            self.mss = DEFAULT_MSS;
        }
        if self.rto_ms == 0 {
            self.rto_ms = DEFAULT_RTO_MS;
        }
        self
    }

    /// Applies defaults and clamps the window to the per-slot state cap.
    pub fn resolve_clamped(self) -> Self {
        let mut cfg = self.resolve();
        if cfg.window > MAX_SR_WINDOW {
            cfg.window = MAX_SR_WINDOW;
        }
        cfg
    }
}
