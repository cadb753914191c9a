//! PhotonKV - An In-Memory Key-Value Store with Snapshots
//!
//! This is the main entry point for the PhotonKV server.
//! It parses flags, sets up logging and runs the server until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use photonkv::config::{DEFAULT_DATA_DIR, DEFAULT_SNAPSHOT_INTERVAL};
use photonkv::{Server, ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "photonkv",
    version,
    about = "PhotonKV - in-memory key-value store with JSON snapshots",
    after_help = "CONNECTING:\n    Any line-based TCP client works:\n    $ nc 127.0.0.1 6379\n    SET name Ada\n    OK\n    GET name\n    Ada"
)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory holding dump.rdb
    #[arg(long, value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Seconds between background snapshots
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_SNAPSHOT_INTERVAL.as_secs(),
          value_parser = clap::value_parser!(u64).range(1..))]
    snapshot_interval: u64,

    /// Run purely in memory: no snapshot load, no saves
    #[arg(long)]
    no_persistence: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            data_dir: args.data_dir,
            snapshot_interval: Duration::from_secs(args.snapshot_interval),
            persistence: !args.no_persistence,
            ..Default::default()
        }
    }
}

fn print_banner(config: &ServerConfig) {
    let persistence = if config.persistence {
        format!(
            "snapshots every {}s in {}",
            config.snapshot_interval.as_secs(),
            config.data_dir.display()
        )
    } else {
        "disabled".to_string()
    };

    println!(
        r#"
PhotonKV v{} - In-Memory Key-Value Store
──────────────────────────────────────────────────────────────
Address:     {}
Persistence: {}

Use Ctrl+C to shutdown gracefully.
"#,
        photonkv::VERSION,
        config.bind_address(),
        persistence
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photonkv=info".into()),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from(Args::parse());
    print_banner(&config);

    let server = Server::bind(config.clone())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C, shutting down");
        }
    };

    server.run(shutdown).await.context("server stopped with an error")?;

    info!("Goodbye");
    Ok(())
}
