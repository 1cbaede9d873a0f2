use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Enemy movement steps per second
    #[arg(short, long, default_value_t = shared::SERVER_TICK_HZ)]
    tick_rate: u32,

    /// Milliseconds between enemy spawns
    #[arg(short, long, default_value = "3000")]
    spawn_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        tick_rate: args.tick_rate,
        spawn_interval: Duration::from_millis(args.spawn_interval_ms.max(1)),
        ..ServerConfig::default()
    };

    info!(
        "Starting server: {} Hz movement tick, spawn every {:?}",
        config.tick_rate, config.spawn_interval
    );

    let address = format!("{}:{}", args.host, args.port);
    let handle = Server::bind(&address, config).await?.spawn();

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    handle.shutdown();

    Ok(())
}
