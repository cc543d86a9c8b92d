use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerMessage, ServerResult};
use std::time::Duration;

const MAX_TICK_RATE: i64 = 1000;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Room snapshots broadcast per second
    #[arg(
        short,
        long,
        default_value = "30",
        value_parser = clap::value_parser!(u32).range(1..=MAX_TICK_RATE)
    )]
    tick_rate: u32,

    /// Maximum number of connected players
    #[arg(short, long, default_value = "32")]
    max_clients: usize,
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let tick_rate = args.tick_rate;
    let tick_duration = Duration::from_secs_f64(1.0 / tick_rate as f64);
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting server on {}", address);
    info!(
        "Broadcast rate: {}Hz, max players: {}",
        tick_rate, args.max_clients
    );

    let mut server = Server::new(&address, tick_duration, args.max_clients).await?;

    let control = server.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            if let Err(e) = control.send(ServerMessage::Shutdown) {
                error!("Failed to signal shutdown: {}", e);
            }
        }
    });

    server.run().await?;

    Ok(())
}
