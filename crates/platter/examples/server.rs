//! Demo kitchen server: ORDER in, simulated cooking, REPLY out.
//!
//! Run with a GBN transport and an impaired channel:
//! - cargo run -p platter --example server -- --port 7777 --proto gbn \
//!     --loss 10 --dup 5 --reorder 10 --dmean 20 --djitter 10 --rate 50 --seed 123
//!
//! The first datagram received (the client's HELLO) seeds the peer
//! address; after that the chosen transport carries the session.

use std::{error::Error, net::UdpSocket, thread::sleep, time::Duration};

use clap::Parser;
use platter::{
    create, Channel, ChannelConfig, CookDistribution, CookModel, Order, Protocol, Reply,
    TransportConfig,
};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "server", about = "Platter demo kitchen server")]
struct Args {
    /// UDP port to listen on.
    #[arg(long, default_value_t = 7777)]
    port: u16,
    /// Transport to serve with: gbn or sr.
    #[arg(long, default_value = "gbn")]
    proto: Protocol,
    /// Drop probability in percent.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    /// Duplication probability in percent.
    #[arg(long, default_value_t = 0.0)]
    dup: f64,
    /// Adjacent reorder probability in percent.
    #[arg(long, default_value_t = 0.0)]
    reorder: f64,
    /// Mean one-way delay in milliseconds.
    #[arg(long, default_value_t = 0.0)]
    dmean: f64,
    /// Delay jitter amplitude in milliseconds.
    #[arg(long, default_value_t = 0.0)]
    djitter: f64,
    /// Token-bucket rate in Mbps (0 = unlimited).
    #[arg(long, default_value_t = 0.0)]
    rate: f64,
    /// RNG seed for channel and kitchen (0 = default).
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Minimum cook time in milliseconds.
    #[arg(long = "cook-min", default_value_t = 40)]
    cook_min: u32,
    /// Maximum cook time in milliseconds.
    #[arg(long = "cook-max", default_value_t = 40)]
    cook_max: u32,
    /// Cook-time distribution: uniform or exp.
    #[arg(long = "cook-dist", default_value = "uniform")]
    cook_dist: String,
    /// Mean cook time for the exp distribution (0 = midpoint of range).
    #[arg(long = "cook-mean", default_value_t = 0.0)]
    cook_mean: f64,
    /// Chatty logging.
    #[arg(short, long)]
    verbose: bool,
    /// Warnings only.
    #[arg(short, long)]
    quiet: bool,
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

    let dist = match args.cook_dist.as_str() {
        "uniform" => CookDistribution::Uniform,
        "exp" => CookDistribution::Exponential,
        other => return Err(format!("unknown cook distribution '{}'", other).into()),
    };

    let socket = UdpSocket::bind(("0.0.0.0", args.port))?;
    info!(port = args.port, proto = %args.proto, "kitchen open");

    // The first datagram (the client's HELLO) seeds the peer address.
    let mut buf = [0u8; 2048];
    let (_, peer) = socket.recv_from(&mut buf)?;
    info!(%peer, "session opened");

    let channel_cfg = ChannelConfig {
        loss_pct: args.loss,
        dup_pct: args.dup,
        reorder_pct: args.reorder,
        delay_mean_ms: args.dmean,
        delay_jitter_ms: args.djitter,
        rate_mbps: args.rate,
        seed: args.seed,
        ..Default::default()
    };
    let channel = Channel::new(socket, peer, channel_cfg)?;
    let transport_cfg =
        TransportConfig { init_seq: 1, window: 32, mss: 512, rto_ms: 150 };
    let mut transport = create(args.proto, channel, transport_cfg);
    let mut kitchen =
        CookModel::new(args.cook_min, args.cook_max, dist, args.cook_mean, args.seed);

    loop {
        match transport.recv(&mut buf, Duration::from_millis(200)) {
            Ok(Some(n)) => match Order::parse(&buf[..n]) {
                Ok(order) => {
                    let cook = kitchen.draw();
                    sleep(cook);
                    let reply = Reply {
                        id: order.id,
                        latency_ms: cook.as_millis() as u32,
                        items: order.items,
                    };
                    transport.send(&reply.encode()?)?;
                    info!(id = order.id, cook_ms = cook.as_millis() as u64, "served");
                }
                Err(_) => debug!(len = n, "ignoring non-order payload"),
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "receive failed");
                return Err(e.into());
            }
        }
    }
}
