//! Memgraph: HTTP gateway over a supervised knowledge-graph store process

use clap::{Parser, Subcommand};
use memgraph_core::{BindMode, GatewayConfig};
use memgraph_gateway::start_gateway;
use memgraph_mcp::{ConnectionManager, EnvConfig, McpConfig, StdioConnector};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "memgraph", about = "HTTP gateway for a tool-calling knowledge-graph store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        #[arg(short, long, env = "MEMGRAPH_PORT", default_value = "18790")]
        port: u16,
        /// `loopback` or `lan`
        #[arg(short, long, env = "MEMGRAPH_BIND", default_value = "loopback")]
        bind: String,
        /// Emit logs as JSON lines
        #[arg(long)]
        log_json: bool,
    },
    /// Print the resolved store process configuration
    Config,
    /// Show version
    Version,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "memgraph=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve {
            port,
            bind,
            log_json,
        }) => {
            init_tracing(log_json);
            let config = GatewayConfig {
                port,
                bind: BindMode::parse(&bind),
            };
            let manager = ConnectionManager::new(Arc::new(StdioConnector), Arc::new(EnvConfig));
            start_gateway(config, manager).await?;
        }

        Some(Commands::Config) => {
            let config = McpConfig::from_env()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Some(Commands::Version) => {
            println!("memgraph v{}", env!("CARGO_PKG_VERSION"));
        }

        None => {
            println!("Usage: memgraph <serve|config|version>");
            println!("Run 'memgraph --help' for more options.");
        }
    }

    Ok(())
}
