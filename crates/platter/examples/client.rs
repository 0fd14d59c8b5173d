//! Demo client: places orders and polls for replies without blocking.
//!
//! Run the server first, then:
//! - cargo run -p platter --example client -- --addr 127.0.0.1:7777 --proto gbn
//! - cargo run -p platter --example client -- --proto sr -c 4 -n 20
//!
//! Each worker thread owns its socket, channel, and transport; nothing is
//! shared between sessions. Replies are polled with a zero timeout in
//! ~100 ms beats so transport timers keep running while the client waits.

use std::{
    error::Error,
    net::{SocketAddr, UdpSocket},
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use platter::{
    constants::HELLO, create, Channel, ChannelConfig, Order, Protocol, Reply, TransportConfig,
};
use tracing::{debug, info, warn};

/// Poll beats per order before giving up (~5 s at 100 ms per beat).
const REPLY_BEATS: u32 = 50;
const BEAT: Duration = Duration::from_millis(100);

#[derive(Parser, Debug, Clone)]
#[command(name = "client", about = "Platter demo ordering client")]
struct Args {
    /// Server address.
    #[arg(long, default_value = "127.0.0.1:7777")]
    addr: SocketAddr,
    /// Transport to order with: gbn or sr.
    #[arg(long, default_value = "gbn")]
    proto: Protocol,
    /// Number of concurrent client threads.
    #[arg(short = 'c', long = "clients", default_value_t = 1)]
    clients: u64,
    /// Orders per thread.
    #[arg(short = 'n', long = "orders", default_value_t = 5)]
    orders: u64,
    /// Chatty logging.
    #[arg(short, long)]
    verbose: bool,
    /// Warnings only.
    #[arg(short, long)]
    quiet: bool,
}

fn worker(worker_id: u64, args: Args) -> platter::Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    // Seed the server's peer address before the transport engages.
    socket.send_to(HELLO, args.addr)?;
    thread::sleep(Duration::from_millis(10));

    let channel = Channel::new(socket, args.addr, ChannelConfig::default())?;
    let transport_cfg =
        TransportConfig { init_seq: 1, window: 32, mss: 512, rto_ms: 150 };
    let mut transport = create(args.proto, channel, transport_cfg);

    let mut buf = [0u8; 2048];
    for n in 1..=args.orders {
        let order = Order {
            id: worker_id * 1_000_000 + n,
            items: "burger fries cola".to_string(),
        };
        let started = Instant::now();
        transport.send(&order.encode()?)?;
        debug!(worker = worker_id, id = order.id, "order sent");

        let mut served = false;
        for _ in 0..REPLY_BEATS {
            if let Some(got) = transport.recv(&mut buf, Duration::ZERO)? {
                match Reply::parse(&buf[..got]) {
                    Ok(reply) => {
                        info!(
                            worker = worker_id,
                            id = reply.id,
                            rtt_ms = started.elapsed().as_millis() as u64,
                            cook_ms = reply.latency_ms,
                            items = %reply.items,
                            "reply"
                        );
                        served = true;
                        break;
                    }
                    Err(_) => debug!(worker = worker_id, "unparseable payload ignored"),
                }
            }
            thread::sleep(BEAT);
        }
        if !served {
            warn!(worker = worker_id, id = order.id, "no reply within the budget");
        }
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);
    info!(addr = %args.addr, proto = %args.proto, clients = args.clients, "placing orders");

    let mut workers = Vec::new();
    for worker_id in 0..args.clients {
        let args = args.clone();
        workers.push(thread::spawn(move || worker(worker_id, args)));
    }
    for handle in workers {
        handle.join().expect("worker panicked")?;
    }
    info!("all orders done");
    Ok(())
}
