use std::{
    collections::VecDeque,
    io,
    net::{SocketAddr, UdpSocket},
    thread::sleep,
    time::{Duration, Instant},
};

use platter_core::{config::ChannelConfig, error::Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use socket2::Socket as Socket2;
use tracing::trace;

/// Upper bound on time spent waiting for the head frame inside one send.
const MAX_SEND_WAIT: Duration = Duration::from_millis(150);
/// Sleep slice while waiting for the head frame to become ready.
const SLEEP_SLICE: Duration = Duration::from_millis(5);
/// Scheduled offset of a duplicated frame relative to the original.
const DUP_OFFSET: Duration = Duration::from_millis(1);

/// An outbound frame delayed until its scheduled release time.
#[derive(Debug)]
struct PendingFrame {
    bytes: Vec<u8>,
    ready_at: Instant,
}

/// Impairment channel bound to a UDP socket and a peer address.
///
/// Sits directly above the datagram substrate: [`Channel::send`] applies
/// the configured impairments before any bytes reach the socket, and
/// [`Channel::recv`] is a bounded blocking receive that re-learns the peer
/// from the source address of each datagram (so a server discovers its
/// client from the first datagram it sees).
#[derive(Debug)]
pub struct Channel {
    socket: UdpSocket,
    peer: SocketAddr,
    cfg: ChannelConfig,
    rng: StdRng,
    pending: VecDeque<PendingFrame>,
    /// Token-bucket spacing; 0 means unlimited.
    ns_per_byte: u64,
    /// Earliest time the token bucket admits the next transmission.
    next_tx_at: Option<Instant>,
}

fn apply_socket_options(socket: &UdpSocket, cfg: &ChannelConfig) -> io::Result<()> {
    let socket2 = Socket2::from(socket.try_clone()?);
    if let Some(size) = cfg.socket_recv_buffer_size {
        socket2.set_recv_buffer_size(size)?;
    }
    if let Some(size) = cfg.socket_send_buffer_size {
        socket2.set_send_buffer_size(size)?;
    }
    Ok(())
}

impl Channel {
    /// Binds a channel to `socket` with `peer` as the initial destination.
    pub fn new(socket: UdpSocket, peer: SocketAddr, cfg: ChannelConfig) -> Result<Self> {
        apply_socket_options(&socket, &cfg)?;
        let ns_per_byte = if cfg.rate_mbps > 0.0 {
            (8000.0 / cfg.rate_mbps) as u64
        } else {
            0
        };
        let rng = StdRng::seed_from_u64(cfg.effective_seed());
        Ok(Self {
            socket,
            peer,
            cfg,
            rng,
            pending: VecDeque::new(),
            ns_per_byte,
            next_tx_at: None,
        })
    }

    /// The peer datagrams are currently sent to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Local address of the owned socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Bernoulli draw for a percentage in `[0, 100]`.
    fn decide(&mut self, pct: f64) -> bool {
        self.rng.gen_range(0.0..100.0) < pct
    }

    /// One-way delay for the next frame: `max(0, mean + U[-jitter, +jitter])`.
    fn jittered_delay(&mut self) -> Duration {
        let jitter = self.rng.gen_range(-1.0..=1.0) * self.cfg.delay_jitter_ms;
        let ms = (self.cfg.delay_mean_ms + jitter).max(0.0);
        Duration::from_secs_f64(ms / 1000.0)
    }

    fn enqueue(&mut self, bytes: &[u8], ready_at: Instant) {
        self.pending.push_back(PendingFrame { bytes: bytes.to_vec(), ready_at });
    }

    /// Swaps the queue head with its successor to emulate mild reordering.
    fn maybe_reorder(&mut self) {
        if self.pending.len() >= 2 && self.decide(self.cfg.reorder_pct) {
            self.pending.swap(0, 1);
        }
    }

    /// Enqueues `bytes` with the configured impairments and transmits every
    /// frame whose release time has arrived.
    ///
    /// The return value is a logical byte count: a frame consumed by the
    /// loss impairment, or still queued behind its delay or the rate
    /// limiter, still reports `bytes.len()` so upper layers never observe
    /// loss directly. Only genuine socket failures surface as errors.
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize> {
        if self.decide(self.cfg.loss_pct) {
            trace!(len = bytes.len(), "channel drop");
            return Ok(bytes.len());
        }

        let ready_at = Instant::now() + self.jittered_delay();
        self.enqueue(bytes, ready_at);
        if self.decide(self.cfg.dup_pct) {
            self.enqueue(bytes, ready_at + DUP_OFFSET);
        }
        self.maybe_reorder();

        // Bounded wait until the head frame is eligible, in short slices so
        // a long configured delay cannot stall the caller past the cap.
        let mut waited = Duration::ZERO;
        while let Some(head) = self.pending.front() {
            let now = Instant::now();
            if head.ready_at <= now {
                break;
            }
            if waited >= MAX_SEND_WAIT {
                break;
            }
            let chunk = (head.ready_at - now).min(SLEEP_SLICE);
            sleep(chunk);
            waited += chunk;
        }

        let mut sent_total = 0usize;
        while let Some(head) = self.pending.front() {
            let now = Instant::now();
            if head.ready_at > now {
                break;
            }
            if self.ns_per_byte > 0 {
                if let Some(next_tx) = self.next_tx_at {
                    if now < next_tx {
                        break;
                    }
                }
            }
            match self.socket.send_to(&head.bytes, self.peer) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
            if self.ns_per_byte > 0 {
                let cost = Duration::from_nanos(self.ns_per_byte * head.bytes.len() as u64);
                self.next_tx_at = Some(now + cost);
            }
            trace!(len = head.bytes.len(), peer = %self.peer, "channel send");
            sent_total += head.bytes.len();
            self.pending.pop_front();
        }

        if sent_total > 0 {
            Ok(sent_total)
        } else {
            Ok(bytes.len())
        }
    }

    /// Receives one datagram into `buf`, waiting at most `timeout`.
    ///
    /// A zero timeout performs a single non-blocking poll. Returns
    /// `Ok(None)` when nothing arrived in time; socket errors other than
    /// the timeout family propagate. On success the source address becomes
    /// the new peer.
    pub fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        let received = if timeout.is_zero() {
            self.socket.set_nonblocking(true)?;
            let r = self.socket.recv_from(buf);
            self.socket.set_nonblocking(false)?;
            r
        } else {
            self.socket.set_read_timeout(Some(timeout))?;
            self.socket.recv_from(buf)
        };
        match received {
            Ok((n, from)) => {
                self.peer = from;
                trace!(len = n, from = %from, "channel recv");
                Ok(Some(n))
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket_pair() -> (UdpSocket, SocketAddr, UdpSocket, SocketAddr) {
        let a = UdpSocket::bind("127.0.0.1:0").unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").unwrap();
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();
        (a, a_addr, b, b_addr)
    }

    fn recv_with_timeout(socket: &UdpSocket, timeout: Duration) -> Option<Vec<u8>> {
        socket.set_read_timeout(Some(timeout)).unwrap();
        let mut buf = [0u8; 2048];
        match socket.recv_from(&mut buf) {
            Ok((n, _)) => Some(buf[..n].to_vec()),
            Err(_) => None,
        }
    }

    #[test]
    fn clean_channel_passes_bytes_through() {
        let (a, _, b, b_addr) = socket_pair();
        let mut ch = Channel::new(a, b_addr, ChannelConfig::default()).unwrap();
        let n = ch.send(b"plate of fries").unwrap();
        assert_eq!(n, 14);
        let got = recv_with_timeout(&b, Duration::from_millis(500)).expect("datagram");
        assert_eq!(got, b"plate of fries");
        // Exactly one copy.
        assert!(recv_with_timeout(&b, Duration::from_millis(50)).is_none());
    }

    #[test]
    fn certain_loss_reports_logical_success_and_sends_nothing() {
        let (a, _, b, b_addr) = socket_pair();
        let cfg = ChannelConfig { loss_pct: 100.0, ..Default::default() };
        let mut ch = Channel::new(a, b_addr, cfg).unwrap();
        for _ in 0..5 {
            assert_eq!(ch.send(b"never arrives").unwrap(), 13);
        }
        assert!(recv_with_timeout(&b, Duration::from_millis(100)).is_none());
    }

    #[test]
    fn certain_duplication_delivers_two_copies() {
        let (a, _, b, b_addr) = socket_pair();
        let cfg = ChannelConfig { dup_pct: 100.0, ..Default::default() };
        let mut ch = Channel::new(a, b_addr, cfg).unwrap();
        ch.send(b"twice").unwrap();
        // The duplicate is scheduled 1ms later; flush it with a second call.
        sleep(Duration::from_millis(5));
        ch.send(b"again").unwrap();
        let mut seen = Vec::new();
        while let Some(got) = recv_with_timeout(&b, Duration::from_millis(200)) {
            seen.push(got);
            if seen.len() == 4 {
                break;
            }
        }
        let twice = seen.iter().filter(|d| d.as_slice() == b"twice").count();
        assert_eq!(twice, 2, "expected both copies, saw {:?}", seen);
    }

    #[test]
    fn reorder_swaps_the_queue_head() {
        let (a, _, _b, b_addr) = socket_pair();
        let cfg = ChannelConfig { reorder_pct: 100.0, ..Default::default() };
        let mut ch = Channel::new(a, b_addr, cfg).unwrap();
        let later = Instant::now() + Duration::from_secs(60);
        ch.enqueue(b"first", later);
        ch.enqueue(b"second", later);
        ch.maybe_reorder();
        assert_eq!(ch.pending[0].bytes, b"second");
        assert_eq!(ch.pending[1].bytes, b"first");
    }

    #[test]
    fn rate_limit_defers_the_second_frame() {
        let (a, _, b, b_addr) = socket_pair();
        // 0.08 Mbps = 100 us per byte, so a 1000-byte frame holds the
        // bucket for ~100 ms.
        let cfg = ChannelConfig { rate_mbps: 0.08, ..Default::default() };
        let mut ch = Channel::new(a, b_addr, cfg).unwrap();
        let frame = vec![0x11u8; 1000];
        assert_eq!(ch.send(&frame).unwrap(), 1000);
        // Second send cannot flush; it still reports the logical count.
        assert_eq!(ch.send(&frame).unwrap(), 1000);
        assert!(recv_with_timeout(&b, Duration::from_millis(30)).is_some());
        assert!(recv_with_timeout(&b, Duration::from_millis(30)).is_none());
    }

    #[test]
    fn recv_timeout_returns_none() {
        let (a, _, _b, b_addr) = socket_pair();
        let mut ch = Channel::new(a, b_addr, ChannelConfig::default()).unwrap();
        let mut buf = [0u8; 64];
        let start = Instant::now();
        assert!(ch.recv(&mut buf, Duration::from_millis(40)).unwrap().is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
        // Zero timeout: single non-blocking poll.
        assert!(ch.recv(&mut buf, Duration::ZERO).unwrap().is_none());
    }

    #[test]
    fn recv_learns_the_peer_from_the_source_address() {
        let (a, a_addr, b, b_addr) = socket_pair();
        let placeholder: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let mut ch = Channel::new(a, placeholder, ChannelConfig::default()).unwrap();
        b.send_to(b"HELLO\n", a_addr).unwrap();
        let mut buf = [0u8; 64];
        let n = ch.recv(&mut buf, Duration::from_millis(500)).unwrap().expect("hello");
        assert_eq!(&buf[..n], b"HELLO\n");
        assert_eq!(ch.peer(), b_addr);
    }

    #[test]
    fn socket_buffer_options_are_applied() {
        let (a, _, _b, b_addr) = socket_pair();
        let cfg = ChannelConfig {
            socket_recv_buffer_size: Some(128 * 1024),
            socket_send_buffer_size: Some(64 * 1024),
            ..Default::default()
        };
        assert!(Channel::new(a, b_addr, cfg).is_ok());
    }
}
