//! `linecast-server`: run the relay from the command line.

use std::time::Duration;

use clap::Parser;
use linecast::prelude::*;

/// Line-oriented TCP chat relay.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Interface to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Most clients allowed in the room at once.
    #[arg(long, default_value_t = 50)]
    max_clients: usize,

    /// Lines that may wait for one client before it is dropped as too slow.
    #[arg(long, default_value_t = 256, value_parser = clap::value_parser!(u64).range(1..))]
    queue_capacity: u64,

    /// Longest line, in bytes, a client may send.
    #[arg(long, default_value_t = 4096)]
    max_line_len: usize,

    /// Seconds a new client has to answer the username prompt. Waits
    /// forever when omitted.
    #[arg(long)]
    handshake_timeout_secs: Option<u64>,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<(), LinecastError> {
    init_tracing();
    let cli = Cli::parse();

    let session_config = SessionConfig {
        queue_capacity: cli.queue_capacity as usize,
        max_line_len: cli.max_line_len,
        handshake_timeout: cli.handshake_timeout_secs.map(Duration::from_secs),
        ..SessionConfig::default()
    };

    let server = LinecastServer::builder()
        .bind(&format!("{}:{}", cli.host, cli.port))
        .max_sessions(cli.max_clients)
        .session_config(session_config)
        .build()
        .await?;

    tracing::info!("press Ctrl+C to stop");
    server.run_until_ctrl_c().await
}
