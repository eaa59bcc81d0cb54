use clap::Parser;
use log::{error, info};
use peer::bootstrap::{resolve_room_id, RoomFile, ShareLink};
use peer::input::{IdleInput, InputSource, WanderInput};
use peer::node::Node;
use peer::transport::RelayTransport;
use peer::view::LogSink;
use peer::{NodeConfig, SessionContext};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Color, MovementSettings, PeerId, MOVE_SPEED};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay server to meet other peers through
    #[arg(short = 'r', long, default_value = "127.0.0.1:9000")]
    relay: SocketAddr,

    /// Share link; the room is taken from its #fragment or ?room= parameter
    #[arg(short = 'l', long, default_value = "dune://sandbox")]
    link: String,

    /// Keep the room id in this file instead of the share link
    #[arg(long)]
    room_file: Option<PathBuf>,

    /// Simulation ticks per second
    #[arg(short = 't', long, default_value = "60")]
    tick_rate: u32,

    /// Distance moved per tick while a direction is held
    #[arg(long, default_value_t = MOVE_SPEED)]
    speed: f32,

    /// Wander around randomly instead of standing still
    #[arg(short = 'w', long)]
    wander: bool,

    /// Seed for the wander input and avatar color
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = NodeConfig {
        tick_rate: args.tick_rate,
        movement: MovementSettings {
            speed: args.speed,
            ..MovementSettings::default()
        },
        ..NodeConfig::default()
    };

    let room_id = match &args.room_file {
        Some(path) => resolve_room_id(&mut RoomFile::new(path))?,
        None => {
            let mut link = ShareLink::new(args.link.clone());
            let room_id = resolve_room_id(&mut link)?;
            info!("Share link: {}", link.as_str());
            room_id
        }
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let color = Color::random(&mut StdRng::seed_from_u64(seed));
    let peer_id = PeerId::generate();
    info!("Starting peer {} with color {}", peer_id, color);

    let (transport, events) =
        RelayTransport::join(args.relay, &room_id, &peer_id, config.join_timeout).await?;

    let input: Box<dyn InputSource> = if args.wander {
        Box::new(WanderInput::new(seed))
    } else {
        Box::new(IdleInput)
    };

    let session = SessionContext::new(room_id, peer_id, color, config.movement);
    let mut node = Node::new(
        session,
        transport,
        events,
        input,
        LogSink::new(config.status_every_ticks),
        config.tick_duration(),
    );

    tokio::select! {
        _ = node.run() => {
            error!("Lost connection to the relay");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving room...");
        }
    }

    node.into_transport().close().await;
    Ok(())
}
