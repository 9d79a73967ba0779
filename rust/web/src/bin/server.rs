//! Pairs web server
//!
//! Usage: cargo run -p pairs_web --bin pairs-web-server -- --port 8080

use clap::Parser;
use pairs_web::config::{self, ServerArgs};
use pairs_web::logging::{init_logging, LogFormat};
use pairs_web::{ServerConfig, WebServer};

#[derive(Debug, Parser)]
#[command(name = "pairs-web-server", version, about = "Pairs memory game web server")]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "PAIRS_LOG_FORMAT")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let resolved = config::load(&cli.server)?;
    let settings = &resolved.settings;
    tracing::info!(
        host = %settings.host,
        port = settings.port,
        static_dir = ?settings.static_dir,
        default_pairs = settings.default_pairs,
        default_max_attempts = settings.default_max_attempts,
        flip_back_delay_ms = settings.flip_back_delay_ms,
        sources = ?resolved.sources,
        "starting pairs web server"
    );

    let server = WebServer::new(ServerConfig::from_settings(settings))?;
    let handle = server.start().await?;
    println!("Pairs is running at http://{}  (Ctrl+C to stop)", handle.address());

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    handle.shutdown().await?;
    Ok(())
}
