use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use sync_match::config::GatewayConfig;
use sync_match::web_server::{self, AppState};
use sync_match::{default_catalog, GroqGateway};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Groq API key used for every chat reply.
    #[arg(long, global = true, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the SYNC web UI.
    Serve {
        #[arg(long, default_value = "127.0.0.1", help = "Address to listen on.")]
        host: IpAddr,
        #[arg(long, default_value_t = 8501, help = "Port for the web server.")]
        port: u16,
        #[arg(long, help = "Load templates from this directory and reload them on change.")]
        templates_dir: Option<PathBuf>,
    },
    /// List the built-in profiles.
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (GROQ_API_KEY and friends)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g. RUST_LOG=info,sync_match=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            templates_dir,
        } => {
            // Refuse to start without a credential; nothing is served before this check.
            let config = GatewayConfig::resolve(cli.api_key)?;
            info!(?config, "Starting SYNC");

            let gateway = GroqGateway::new(config).context("Failed to build HTTP client")?;
            let state = AppState::new(default_catalog(), Arc::new(gateway), templates_dir);
            let addr = SocketAddr::new(host, port);

            let mut web_server_handle = tokio::spawn(web_server::start_web_server(addr, state));

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down...");
                    web_server_handle.abort();
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(Ok(())) => info!("Web server task exited."),
                        Ok(Err(e)) => return Err(e),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }
            info!("Shutdown complete.");
        }
        Commands::Profiles => {
            for profile in default_catalog().iter() {
                println!("{}, {}: {}", profile.name, profile.age, profile.daily_mood);
            }
        }
    }

    Ok(())
}
