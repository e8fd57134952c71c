//! Switchboard — dynamic namespace server for multiplexed real-time
//! connections.
//!
//! A single-process server that routes WebSocket connections into logical
//! sub-channels ("namespaces") which are created on demand, scoped by host,
//! and reclaimed when idle.
//!
//! Usage:
//!   switchboard                                  # Default port 7080
//!   switchboard --port 9090                      # Custom port
//!   switchboard --host-pattern '^a\.com$'        # Only a.com maps to the main host
//!   switchboard --retirement-ms 30000            # Idle namespaces live 30s
//!   switchboard --public-status                  # Expose /status

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use regex::Regex;
use swb_core::{NsPattern, Registry, ServerConfig, SetupFn};
use swb_transport::{TransportConfig, TransportServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "switchboard", about = "Switchboard — dynamic namespace server")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "7080")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Regex for host headers that resolve to the main (hostless) identity.
    /// Matches everything when omitted.
    #[arg(long)]
    host_pattern: Option<String>,

    /// Idle lifetime for auto-created namespaces, in milliseconds
    #[arg(long, default_value = "10000")]
    retirement_ms: u64,

    /// Regex for namespaces clients may create on demand
    #[arg(long)]
    allow_namespaces: Option<String>,

    /// Expose the plain-text /status endpoint
    #[arg(long)]
    public_status: bool,

    /// Maximum concurrent connections
    #[arg(long, default_value = "1024")]
    max_connections: usize,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn parse_pattern(arg: &str, flag: &str) -> NsPattern {
    match Regex::new(arg) {
        Ok(re) => NsPattern::Regex(re),
        Err(e) => {
            error!("invalid {flag}: {e}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let host = match &cli.host_pattern {
        Some(p) => parse_pattern(p, "--host-pattern"),
        None => NsPattern::Any,
    };

    let registry = Registry::new(ServerConfig {
        host,
        retirement: Duration::from_millis(cli.retirement_ms),
        public_status: cli.public_status,
    });

    // Without a registration, clients can only join the root namespace.
    if let Some(p) = &cli.allow_namespaces {
        let accept: SetupFn = Arc::new(|_ns, _m| true);
        registry.register_setup(parse_pattern(p, "--allow-namespaces"), accept);
    }

    let config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        max_connections: Some(cli.max_connections),
        verbose_logging: cli.verbose,
    };

    let mut server = match TransportServer::start(config, registry).await {
        Ok(s) => s,
        Err(e) => {
            error!("failed to start transport: {e}");
            std::process::exit(1);
        }
    };
    info!(
        "switchboard ready on ws://{}:{}/ws",
        cli.hostname,
        server.port()
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
    info!("shutting down");
    server.stop().await;
}
