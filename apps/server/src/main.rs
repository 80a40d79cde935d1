use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use compost_server::build_state;
use compost_server::config::Config;
use compost_server::web::create_web_server;

/// Compost monitoring server
#[derive(Parser, Debug)]
#[command(name = "compost-server", about = "Compost monitoring and fuzzy temperature control")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "compost.toml")]
    config: PathBuf,

    /// Overrides http.bind from the configuration
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("compost_server=info,compost_control=info,tower_http=info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let bind = args.bind.unwrap_or(config.http.bind);

    info!(
        config = %args.config.display(),
        recipients = config.recipients.len(),
        rotation_threshold = config.telemetry.rotation_threshold,
        "Starting compost server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = build_state(&config)?;
    create_web_server(state, bind).await
}
