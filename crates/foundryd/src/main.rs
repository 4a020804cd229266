use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use foundry_core::{FoundryConfig, TaskDispatcher};
use tracing::{info, Level};

#[derive(Debug, Parser)]
#[command(name = "foundryd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Foundry orchestrator HTTP service", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "FOUNDRY_LISTEN", default_value = "0.0.0.0:8000")]
    listen: SocketAddr,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    foundry_core::init_tracing(args.json, level);

    let config = FoundryConfig::from_env();
    let dispatcher =
        TaskDispatcher::from_config(&config).context("Failed to configure completion backend")?;
    let app = foundryd::router(foundryd::AppState::new(dispatcher, config));

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .context("bind server listener failed")?;
    info!(event = "server_started", listen = %args.listen, "foundryd listening");
    axum::serve(listener, app)
        .await
        .context("server terminated with error")
}
