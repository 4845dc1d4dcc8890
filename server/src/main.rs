use clap::Parser;
use log::{info, warn};
use server::config::{map_by_index, LobbyConfig, ServerSettings};
use server::network::Server;
use shared::ModeKind;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum connected clients across all lobbies
    #[arg(short = 'c', long, default_value = "64")]
    max_clients: usize,

    /// Number of independent lobbies
    #[arg(short, long, default_value = "2")]
    lobbies: u32,

    /// Mode of the first round (ffa, tdm, koth, ctf, zombies, juggernaut)
    #[arg(short, long, default_value = "ffa")]
    mode: String,

    /// Map index of the first round
    #[arg(long, default_value = "0")]
    map: usize,

    /// Round length in seconds
    #[arg(long, default_value = "300")]
    round_secs: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mode = ModeKind::from_name(&args.mode).unwrap_or_else(|| {
        warn!("Unknown mode '{}', starting with free-for-all", args.mode);
        ModeKind::FreeForAll
    });
    let (map, map_def) = map_by_index(args.map);
    let tick_rate = args.tick_rate.max(1);

    let settings = ServerSettings {
        tick_duration: Duration::from_secs_f64(1.0 / tick_rate as f64),
        max_clients: args.max_clients,
        lobby_count: args.lobbies.max(1),
        mode,
        map,
        lobby: LobbyConfig::for_tick_rate(tick_rate, args.round_secs),
    };

    info!("Starting server...");
    info!(
        "{} lobbies, first round {} on {}",
        settings.lobby_count,
        mode.name(),
        map_def.name
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, settings).await?;
    server.run().await
}
