use clap::Parser;
use log::info;
use relay::config::{parse_max_peers, RelayConfig, DEFAULT_MAX_PEERS_PER_ROOM, DEFAULT_PORT};
use relay::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of peers in one room (at most 32)
    #[arg(short, long, default_value_t = DEFAULT_MAX_PEERS_PER_ROOM, value_parser = parse_max_peers)]
    max_peers: usize,

    /// Seconds of silence before a peer is dropped from its room
    #[arg(short, long, default_value = "5")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = RelayConfig {
        host: args.host,
        port: args.port,
        max_peers_per_room: args.max_peers,
        peer_timeout: Duration::from_secs(args.timeout_secs),
        ..RelayConfig::default()
    };

    info!(
        "Starting relay on {} (max {} peers per room)",
        config.bind_addr(),
        config.max_peers_per_room
    );

    let mut server = Server::new(&config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down relay");
        }
    }

    Ok(())
}
