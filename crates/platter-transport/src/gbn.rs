//! Go-Back-N: one cumulative ACK stream, one timer, batch recovery.
//!
//! The sender fragments the latest application message into a snapshot and
//! emits frames while the window has room; if the window fills, send simply
//! stops and returns. All liveness (ACK consumption, timer checks, batch
//! retransmission of the outstanding range) runs inside [`Gbn::recv`], so
//! a caller that polls receive drives the whole machine.
//!
//! The receiver accepts only the next expected sequence. Anything else is
//! answered with a corrective ACK restating `rcv_nxt` and discarded; there
//! is no reordering buffer on this side, just a single-slot latch for the
//! payload being handed to the caller.

use std::time::Duration;

use platter_channel::Channel;
use platter_core::{
    config::TransportConfig,
    constants::MAX_MESSAGE_SIZE,
    error::Result,
    seq::{ack_acceptable, in_flight, next_seq, seq_cmp},
    timer::DeadlineTimer,
};
use platter_protocol::wire::{self, FLAG_DATA, HEADER_SIZE};
use tracing::debug;

use crate::{send_pure_ack, Transport, RECV_BUF};

/// Go-Back-N transport instance.
#[derive(Debug)]
pub struct Gbn {
    ch: Channel,
    cfg: TransportConfig,
    /// First unacknowledged sequence.
    snd_una: u32,
    /// Next sequence to assign.
    snd_nxt: u32,
    /// Next in-order sequence expected from the peer.
    rcv_nxt: u32,
    /// Single base timer covering the whole outstanding window.
    timer: DeadlineTimer,
    /// Snapshot of the last application message, for retransmission.
    snapshot: Vec<u8>,
    /// Sequence the snapshot's first frame was sent under.
    base_seq: u32,
    /// In-order payload awaiting pickup by the caller.
    latch: Option<Vec<u8>>,
}

impl Gbn {
    /// Creates a GBN transport bound to `channel`, applying defaults to
    /// zero-valued `cfg` fields.
    pub fn new(channel: Channel, cfg: TransportConfig) -> Self {
        let cfg = cfg.resolve();
        Self {
            ch: channel,
            cfg,
            snd_una: cfg.init_seq,
            snd_nxt: cfg.init_seq,
            rcv_nxt: cfg.init_seq,
            timer: DeadlineTimer::new(),
            snapshot: Vec::new(),
            base_seq: cfg.init_seq,
            latch: None,
        }
    }

    /// Number of frames currently in flight.
    pub fn in_flight_frames(&self) -> u32 {
        in_flight(self.snd_una, self.snd_nxt)
    }

    fn rto(&self) -> Duration {
        Duration::from_millis(u64::from(self.cfg.rto_ms))
    }

    /// Packs and transmits one DATA frame, arming the base timer on the
    /// first outstanding frame.
    fn send_data_frame(&mut self, seq: u32, payload: &[u8]) -> Result<()> {
        let mut buf = vec![0u8; HEADER_SIZE + payload.len()];
        let n = wire::pack(&mut buf, FLAG_DATA, seq, self.rcv_nxt, payload);
        self.ch.send(&buf[..n])?;
        if !self.timer.is_armed() {
            self.timer.arm(self.rto());
        }
        Ok(())
    }

    /// Retransmits every frame in `[snd_una, snd_nxt)` from the snapshot
    /// and rearms the timer.
    fn retransmit_window(&mut self) -> Result<()> {
        if self.in_flight_frames() == 0 || self.snapshot.is_empty() {
            self.timer.disarm();
            return Ok(());
        }
        let mss = self.cfg.mss as usize;
        let mut q = self.snd_una;
        while seq_cmp(self.snd_nxt, q) > 0 {
            let index = q.wrapping_sub(self.base_seq) as usize;
            let off = match index.checked_mul(mss) {
                Some(off) if off < self.snapshot.len() => off,
                _ => break,
            };
            let end = (off + mss).min(self.snapshot.len());
            let chunk = self.snapshot[off..end].to_vec();
            debug!(seq = q, len = chunk.len(), "gbn retransmit");
            self.send_data_frame(q, &chunk)?;
            q = next_seq(q);
        }
        self.timer.arm(self.rto());
        Ok(())
    }

    /// Hands the latched payload to the caller, truncating to `out`.
    fn take_latched(&mut self, out: &mut [u8]) -> Option<usize> {
        let payload = self.latch.take()?;
        let n = payload.len().min(out.len());
        out[..n].copy_from_slice(&payload[..n]);
        Some(n)
    }
}

impl Transport for Gbn {
    /// Snapshots `data` and emits frames while the window has room.
    ///
    /// Never blocks: when the window fills mid-message the remaining bytes
    /// stay unsent and the call still succeeds. Progress resumes through
    /// the caller's receive loop. Messages beyond the snapshot bound are
    /// truncated.
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let len = data.len().min(MAX_MESSAGE_SIZE);
        self.snapshot.clear();
        self.snapshot.extend_from_slice(&data[..len]);
        self.base_seq = self.snd_nxt;

        let mss = self.cfg.mss as usize;
        let mut off = 0;
        while off < len {
            if self.in_flight_frames() >= self.cfg.window {
                break;
            }
            let end = (off + mss).min(len);
            let chunk = self.snapshot[off..end].to_vec();
            self.send_data_frame(self.snd_nxt, &chunk)?;
            self.snd_nxt = next_seq(self.snd_nxt);
            off = end;
        }
        Ok(())
    }

    /// Polls the channel once, processing ACKs, expiry-driven batch
    /// retransmission, and in-order delivery.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        if let Some(n) = self.take_latched(buf) {
            return Ok(Some(n));
        }

        if self.in_flight_frames() > 0 && self.timer.expired() {
            self.retransmit_window()?;
        }

        let mut ibuf = [0u8; RECV_BUF];
        let n = match self.ch.recv(&mut ibuf, timeout)? {
            Some(n) => n,
            None => {
                // Check again so an idle poll still drives recovery.
                if self.in_flight_frames() > 0 && self.timer.expired() {
                    self.retransmit_window()?;
                }
                return Ok(None);
            }
        };

        let (header, payload) = match wire::parse(&ibuf[..n]) {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        debug!(
            flags = header.flags,
            seq = header.seq,
            ack = header.ack,
            len = header.len,
            rcv_nxt = self.rcv_nxt,
            "gbn header"
        );

        // Cumulative ACK: slide the window, stop the timer when it empties.
        if ack_acceptable(header.ack, self.snd_una, self.snd_nxt) {
            self.snd_una = header.ack;
            if self.in_flight_frames() == 0 {
                self.timer.disarm();
            } else {
                self.timer.arm(self.rto());
            }
        }

        if !header.is_data() {
            return Ok(None);
        }

        // Only the next expected sequence is accepted; everything else is
        // answered with a corrective ACK and dropped.
        if seq_cmp(header.seq, self.rcv_nxt) != 0 {
            send_pure_ack(&mut self.ch, self.rcv_nxt)?;
            return Ok(None);
        }

        self.latch = Some(payload.to_vec());
        self.rcv_nxt = next_seq(self.rcv_nxt);
        send_pure_ack(&mut self.ch, self.rcv_nxt)?;
        Ok(self.take_latched(buf))
    }
}
