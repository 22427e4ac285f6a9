use clap::Parser;
use log::{error, info};
use server::network::{BoxError, Server, ServerMessage};
use server::ServerConfig;
use std::path::PathBuf;
use tokio::net::TcpListener;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = shared::TICK_RATE)]
    tick_rate: u32,

    /// Directory with the client entry page and its assets
    #[arg(long, default_value = "public")]
    public_dir: PathBuf,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            tick_rate: args.tick_rate,
            public_dir: args.public_dir,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from(Args::parse());
    let listener = TcpListener::bind(config.addr()).await?;
    info!(
        "Starting presence server at {} Hz on {}",
        config.tick_rate,
        config.addr()
    );

    let server = Server::new(config);
    let shutdown = server.sender();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    if let Err(e) = server.run(listener).await {
        error!("Server stopped with error: {}", e);
        return Err(e);
    }

    Ok(())
}
