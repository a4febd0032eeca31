//! DocBridge server
//!
//! Serves DocBridge databases over the `cproto://` protocol.

use clap::Parser;
use docbridge_server::{DocServer, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// DocBridge database server.
#[derive(Parser)]
#[command(name = "docbridge-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:6534")]
    bind: SocketAddr,

    /// Directory holding one subdirectory per database (in-memory if omitted)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Maximum concurrent connections
    #[arg(long, default_value = "256")]
    max_connections: usize,

    /// Seconds after which a running request is logged as slow
    #[arg(long, default_value = "30")]
    request_timeout: u64,

    /// Refuse logins to databases that do not exist yet
    #[arg(long)]
    no_create: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ServerConfig::new(cli.bind)
        .with_max_connections(cli.max_connections)
        .with_request_timeout(Duration::from_secs(cli.request_timeout))
        .with_allow_create_database(!cli.no_create);
    if let Some(dir) = cli.data_dir {
        std::fs::create_dir_all(&dir)?;
        config = config.with_data_dir(dir);
    }

    DocServer::new(config).serve().await?;
    Ok(())
}
