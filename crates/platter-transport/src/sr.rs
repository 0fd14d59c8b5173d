//! Selective Repeat: per-sequence timers, targeted recovery, reordering.
//!
//! The sender keeps an owned payload copy and an independent timer in a
//! ring slot per outstanding frame; a timeout retransmits exactly that
//! frame. [`Sr::send`] blocks until the whole message is acknowledged: it
//! interleaves non-blocking ACK polls, expiry scans, and a short backoff
//! while the window is full, then drains with RTO-length waits until
//! `snd_una` catches `snd_nxt`.
//!
//! The receiver admits any sequence inside `[rcv_nxt, rcv_nxt + W)` into a
//! ring indexed `seq mod W` and, when the head-of-line gap closes, hands
//! the caller the entire contiguous prefix in one call. ACKs are
//! cumulative and consumed from every parsed header, piggybacked or pure.

use std::{thread::sleep, time::Duration};

use platter_channel::Channel;
use platter_core::{
    config::TransportConfig,
    error::Result,
    seq::{ack_acceptable, in_flight, next_seq, seq_cmp},
    timer::DeadlineTimer,
};
use platter_protocol::wire::{self, FrameHeader, FLAG_DATA, HEADER_SIZE};
use tracing::debug;

use crate::{send_pure_ack, Transport, RECV_BUF};

/// Backoff while the send window is full.
const WINDOW_FULL_BACKOFF: Duration = Duration::from_millis(1);

/// Sender-side ring slot: an in-flight frame awaiting acknowledgment.
#[derive(Debug)]
struct TxSlot {
    payload: Vec<u8>,
    timer: DeadlineTimer,
    in_use: bool,
}

/// Receiver-side ring slot: an out-of-order payload awaiting its gap.
#[derive(Debug)]
struct RxSlot {
    payload: Vec<u8>,
    present: bool,
}

/// Selective Repeat transport instance.
#[derive(Debug)]
pub struct Sr {
    ch: Channel,
    cfg: TransportConfig,
    /// First unacknowledged sequence.
    snd_una: u32,
    /// Next sequence to assign.
    snd_nxt: u32,
    /// Next in-order sequence expected from the peer.
    rcv_nxt: u32,
    tx: Vec<TxSlot>,
    rx: Vec<RxSlot>,
}

impl Sr {
    /// Creates an SR transport bound to `channel`, applying defaults to
    /// zero-valued `cfg` fields and clamping the window to the slot cap.
    pub fn new(channel: Channel, cfg: TransportConfig) -> Self {
        let cfg = cfg.resolve_clamped();
        let mss = cfg.mss as usize;
        let window = cfg.window as usize;
        let tx = (0..window)
            .map(|_| TxSlot {
                payload: Vec::with_capacity(mss),
                timer: DeadlineTimer::new(),
                in_use: false,
            })
            .collect();
        let rx = (0..window)
            .map(|_| RxSlot { payload: Vec::with_capacity(mss), present: false })
            .collect();
        Self {
            ch: channel,
            cfg,
            snd_una: cfg.init_seq,
            snd_nxt: cfg.init_seq,
            rcv_nxt: cfg.init_seq,
            tx,
            rx,
        }
    }

    /// Number of frames currently in flight.
    pub fn in_flight_frames(&self) -> u32 {
        in_flight(self.snd_una, self.snd_nxt)
    }

    fn rto(&self) -> Duration {
        Duration::from_millis(u64::from(self.cfg.rto_ms))
    }

    fn slot_index(&self, seq: u32) -> usize {
        (seq % self.cfg.window) as usize
    }

    fn send_data_frame(&mut self, seq: u32, payload: &[u8]) -> Result<()> {
        let mut buf = vec![0u8; HEADER_SIZE + payload.len()];
        let n = wire::pack(&mut buf, FLAG_DATA, seq, self.rcv_nxt, payload);
        self.ch.send(&buf[..n])?;
        Ok(())
    }

    /// Slides `snd_una` up to a cumulative ACK, releasing each slot.
    ///
    /// Called for every parsed header, ACK-only or piggybacked DATA, so
    /// the send window advances regardless of what the peer is doing.
    fn consume_ack(&mut self, header: &FrameHeader) {
        if !ack_acceptable(header.ack, self.snd_una, self.snd_nxt) {
            return;
        }
        while seq_cmp(self.snd_una, header.ack) < 0 {
            let idx = self.slot_index(self.snd_una);
            let slot = &mut self.tx[idx];
            if slot.in_use {
                slot.payload.clear();
                slot.in_use = false;
                slot.timer.disarm();
            }
            self.snd_una = next_seq(self.snd_una);
        }
    }

    /// One bounded poll of the channel, feeding any ACK into the window.
    fn poll_acks(&mut self, timeout: Duration) -> Result<()> {
        let mut ibuf = [0u8; RECV_BUF];
        if let Some(n) = self.ch.recv(&mut ibuf, timeout)? {
            if let Some((header, _)) = wire::parse(&ibuf[..n]) {
                self.consume_ack(&header);
            }
        }
        Ok(())
    }

    /// Retransmits exactly the in-flight frames whose timers expired.
    fn retransmit_expired(&mut self) -> Result<()> {
        let mut q = self.snd_una;
        while seq_cmp(self.snd_nxt, q) > 0 {
            let idx = self.slot_index(q);
            if self.tx[idx].in_use && self.tx[idx].timer.expired() {
                let mut frame = vec![0u8; HEADER_SIZE + self.tx[idx].payload.len()];
                let n = wire::pack(&mut frame, FLAG_DATA, q, self.rcv_nxt, &self.tx[idx].payload);
                debug!(seq = q, "sr retransmit");
                self.ch.send(&frame[..n])?;
                let rto = self.rto();
                self.tx[idx].timer.arm(rto);
            }
            q = next_seq(q);
        }
        Ok(())
    }

    /// Copies the contiguous in-order prefix starting at `rcv_nxt` into
    /// `buf`, clearing each released slot. Stops when the prefix ends or
    /// `buf` is full; undelivered slots stay buffered for the next call.
    fn deliver_prefix(&mut self, buf: &mut [u8]) -> usize {
        let mut delivered = 0;
        loop {
            let idx = self.slot_index(self.rcv_nxt);
            if !self.rx[idx].present || delivered == buf.len() {
                break;
            }
            let slot = &mut self.rx[idx];
            let take = slot.payload.len().min(buf.len() - delivered);
            buf[delivered..delivered + take].copy_from_slice(&slot.payload[..take]);
            delivered += take;
            slot.payload.clear();
            slot.present = false;
            self.rcv_nxt = next_seq(self.rcv_nxt);
        }
        delivered
    }
}

impl Transport for Sr {
    /// Fragments `data` and blocks until every frame is acknowledged.
    ///
    /// While bytes remain: poll for ACKs without blocking, retransmit
    /// expired slots, back off ~1 ms when the window is full, otherwise
    /// cut and transmit the next chunk. Afterwards drain with RTO-length
    /// waits until the window is empty.
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mss = self.cfg.mss as usize;
        let mut off = 0;
        while off < data.len() {
            self.poll_acks(Duration::ZERO)?;
            self.retransmit_expired()?;

            if self.in_flight_frames() >= self.cfg.window {
                sleep(WINDOW_FULL_BACKOFF);
                continue;
            }

            let end = (off + mss).min(data.len());
            let chunk = &data[off..end];
            let seq = self.snd_nxt;
            self.send_data_frame(seq, chunk)?;

            let idx = self.slot_index(seq);
            let rto = self.rto();
            let slot = &mut self.tx[idx];
            slot.payload.clear();
            slot.payload.extend_from_slice(chunk);
            slot.in_use = true;
            slot.timer.arm(rto);

            self.snd_nxt = next_seq(self.snd_nxt);
            off = end;
        }

        while seq_cmp(self.snd_una, self.snd_nxt) < 0 {
            self.poll_acks(self.rto())?;
            self.retransmit_expired()?;
        }
        Ok(())
    }

    /// Polls the channel once; buffers out-of-order DATA and delivers the
    /// contiguous in-order prefix when the head-of-line gap closes.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        // A capacity-truncated delivery can leave the head of the prefix
        // buffered; hand it over before polling for more traffic.
        if self.rx[self.slot_index(self.rcv_nxt)].present {
            let delivered = self.deliver_prefix(buf);
            send_pure_ack(&mut self.ch, self.rcv_nxt)?;
            return Ok(Some(delivered));
        }

        let mut ibuf = [0u8; RECV_BUF];
        let n = match self.ch.recv(&mut ibuf, timeout)? {
            Some(n) => n,
            None => return Ok(None),
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
            "sr header"
        );

        // The cumulative ACK rides on every header; consume it first.
        self.consume_ack(&header);

        if !header.is_data() {
            return Ok(None);
        }

        // Outside the admission window: above it (not yet admissible) or
        // below it (already delivered). Restate rcv_nxt either way.
        let above = seq_cmp(header.seq, self.rcv_nxt.wrapping_add(self.cfg.window)) >= 0;
        let below = seq_cmp(header.seq, self.rcv_nxt) < 0;
        if above || below {
            send_pure_ack(&mut self.ch, self.rcv_nxt)?;
            return Ok(None);
        }

        let idx = self.slot_index(header.seq);
        if !self.rx[idx].present {
            self.rx[idx].payload.clear();
            self.rx[idx].payload.extend_from_slice(payload);
            self.rx[idx].present = true;
        }

        if seq_cmp(header.seq, self.rcv_nxt) == 0 {
            // The gap just closed: release the whole contiguous prefix.
            let delivered = self.deliver_prefix(buf);
            send_pure_ack(&mut self.ch, self.rcv_nxt)?;
            return Ok(Some(delivered));
        }

        // A gap remains; the buffered frame waits for it to close.
        send_pure_ack(&mut self.ch, self.rcv_nxt)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{SocketAddr, UdpSocket};

    use platter_core::config::ChannelConfig;
    use platter_protocol::wire::FLAG_ACK;

    fn sr_with_raw_peer(cfg: TransportConfig) -> (Sr, UdpSocket, SocketAddr) {
        let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sr_addr = sock.local_addr().unwrap();
        let ch = Channel::new(sock, raw.local_addr().unwrap(), ChannelConfig::default()).unwrap();
        (Sr::new(ch, cfg), raw, sr_addr)
    }

    fn read_frame(raw: &UdpSocket) -> Option<(FrameHeader, Vec<u8>)> {
        raw.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
        let mut buf = [0u8; RECV_BUF];
        let (n, _) = raw.recv_from(&mut buf).ok()?;
        wire::parse(&buf[..n]).map(|(h, p)| (h, p.to_vec()))
    }

    fn packed(flags: u8, seq: u32, ack: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE + payload.len()];
        let n = wire::pack(&mut buf, flags, seq, ack, payload);
        buf.truncate(n);
        buf
    }

    /// Acknowledges DATA frames cumulatively, like a well-behaved
    /// receiver, until the cumulative ack reaches `until`.
    fn ack_frames(raw: &UdpSocket, peer: SocketAddr, init_seq: u32, until: u32) {
        let mut expected = init_seq;
        while seq_cmp(expected, until) < 0 {
            let Some((h, _)) = read_frame(raw) else { break };
            if !h.is_data() {
                continue;
            }
            if h.seq == expected {
                expected = next_seq(expected);
            }
            raw.send_to(&packed(FLAG_ACK, 0, expected, b""), peer).unwrap();
        }
    }

    #[test]
    fn send_blocks_until_fully_acknowledged() {
        let cfg = TransportConfig { init_seq: 1, mss: 4, rto_ms: 60, ..Default::default() };
        let (mut sr, raw, sr_addr) = sr_with_raw_peer(cfg);

        let acker = std::thread::spawn(move || ack_frames(&raw, sr_addr, 1, 4));
        sr.send(b"abcdefghij").unwrap();
        assert_eq!(sr.in_flight_frames(), 0, "send returned before the drain finished");
        acker.join().unwrap();
    }

    #[test]
    fn expired_slot_retransmits_only_that_frame() {
        let cfg =
            TransportConfig { init_seq: 1, window: 4, mss: 4, rto_ms: 150, ..Default::default() };
        let (mut sr, raw, sr_addr) = sr_with_raw_peer(cfg);

        let acker = std::thread::spawn(move || {
            let (h1, _) = read_frame(&raw).expect("frame 1");
            let (h2, _) = read_frame(&raw).expect("frame 2");
            assert_eq!((h1.seq, h2.seq), (1, 2));
            // Acknowledge frame 1 only; its slot is released, so when the
            // RTO fires the retransmission must be frame 2 alone.
            raw.send_to(&packed(FLAG_ACK, 0, 2, b""), sr_addr).unwrap();
            let (r, _) = read_frame(&raw).expect("targeted retransmission");
            assert_eq!(r.seq, 2, "only the timed-out frame is retransmitted");
            raw.send_to(&packed(FLAG_ACK, 0, 3, b""), sr_addr).unwrap();
        });

        sr.send(b"abcdefgh").unwrap();
        assert_eq!(sr.in_flight_frames(), 0);
        acker.join().unwrap();
    }

    #[test]
    fn out_of_order_frames_reassemble_in_sequence() {
        // Arrival order 2, 3, 1 within a window of 4 starting at 1 must
        // come out concatenated as if they had arrived 1, 2, 3.
        let cfg = TransportConfig { init_seq: 1, window: 4, ..Default::default() };
        let (mut sr, raw, sr_addr) = sr_with_raw_peer(cfg);
        let mut buf = [0u8; RECV_BUF];

        raw.send_to(&packed(FLAG_DATA, 2, 1, b"b"), sr_addr).unwrap();
        assert!(sr.recv(&mut buf, Duration::from_millis(500)).unwrap().is_none());
        let (h, _) = read_frame(&raw).expect("ack for buffered frame");
        assert_eq!(h.ack, 1, "gap remains, ack restates rcv_nxt");

        raw.send_to(&packed(FLAG_DATA, 3, 1, b"c"), sr_addr).unwrap();
        assert!(sr.recv(&mut buf, Duration::from_millis(500)).unwrap().is_none());
        let (h, _) = read_frame(&raw).expect("ack for buffered frame");
        assert_eq!(h.ack, 1);

        raw.send_to(&packed(FLAG_DATA, 1, 1, b"a"), sr_addr).unwrap();
        let n = sr.recv(&mut buf, Duration::from_millis(500)).unwrap().expect("prefix");
        assert_eq!(&buf[..n], b"abc");
        let (h, _) = read_frame(&raw).expect("ack after delivery");
        assert_eq!(h.ack, 4, "the whole prefix is acknowledged");
    }

    #[test]
    fn duplicate_of_delivered_data_is_acked_but_not_redelivered() {
        let cfg = TransportConfig { init_seq: 1, window: 4, ..Default::default() };
        let (mut sr, raw, sr_addr) = sr_with_raw_peer(cfg);
        let mut buf = [0u8; RECV_BUF];

        raw.send_to(&packed(FLAG_DATA, 1, 1, b"once"), sr_addr).unwrap();
        let n = sr.recv(&mut buf, Duration::from_millis(500)).unwrap().expect("delivery");
        assert_eq!(&buf[..n], b"once");
        read_frame(&raw);

        raw.send_to(&packed(FLAG_DATA, 1, 1, b"once"), sr_addr).unwrap();
        assert!(sr.recv(&mut buf, Duration::from_millis(500)).unwrap().is_none());
        let (h, _) = read_frame(&raw).expect("corrective ack");
        assert_eq!(h.ack, 2);
    }

    #[test]
    fn above_window_data_is_rejected_with_an_ack() {
        let cfg = TransportConfig { init_seq: 1, window: 4, ..Default::default() };
        let (mut sr, raw, sr_addr) = sr_with_raw_peer(cfg);
        let mut buf = [0u8; RECV_BUF];

        // Window is [1, 5); 5 is the first inadmissible sequence.
        raw.send_to(&packed(FLAG_DATA, 5, 1, b"far"), sr_addr).unwrap();
        assert!(sr.recv(&mut buf, Duration::from_millis(500)).unwrap().is_none());
        let (h, _) = read_frame(&raw).expect("corrective ack");
        assert_eq!(h.ack, 1);
    }

    #[test]
    fn piggybacked_ack_advances_the_send_window() {
        let cfg = TransportConfig { init_seq: 1, window: 4, mss: 8, ..Default::default() };
        let (mut sr, raw, sr_addr) = sr_with_raw_peer(cfg);

        let acker = std::thread::spawn(move || {
            let (h, _) = read_frame(&raw).expect("data frame");
            assert_eq!(h.seq, 1);
            // Acknowledge via a DATA frame carrying ack=2 instead of a
            // pure ACK.
            raw.send_to(&packed(FLAG_DATA | FLAG_ACK, 1, 2, b"reply"), sr_addr).unwrap();
            // Absorb the receiver's own ack.
            while read_frame(&raw).is_some() {}
        });

        sr.send(b"hi").unwrap();
        assert_eq!(sr.in_flight_frames(), 0);
        acker.join().unwrap();
    }

    #[test]
    fn prefix_delivery_respects_caller_capacity() {
        let cfg = TransportConfig { init_seq: 1, window: 4, ..Default::default() };
        let (mut sr, raw, sr_addr) = sr_with_raw_peer(cfg);
        let mut small = [0u8; 5];

        raw.send_to(&packed(FLAG_DATA, 2, 1, b"second"), sr_addr).unwrap();
        assert!(sr.recv(&mut small, Duration::from_millis(500)).unwrap().is_none());
        raw.send_to(&packed(FLAG_DATA, 1, 1, b"first"), sr_addr).unwrap();
        let n = sr.recv(&mut small, Duration::from_millis(500)).unwrap().expect("delivery");
        // "first" fills the buffer; "second" stays buffered for the next
        // call once the caller makes room.
        assert_eq!(&small[..n], b"first");

        let mut big = [0u8; 64];
        let n = sr.recv(&mut big, Duration::ZERO).unwrap().expect("buffered leftover");
        assert_eq!(&big[..n], b"second");
    }
}
