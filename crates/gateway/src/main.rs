//! Binary entry point for the Toolbridge gateway.

use anyhow::Context as _;
use clap::Parser;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use toolbridge_gateway::config::{self, GatewayConfig};
use toolbridge_gateway::session::SessionManager;

#[derive(Parser, Debug)]
#[command(
    name = "toolbridge-gateway",
    version,
    about = "Expose generated REST tool catalogs over MCP streamable HTTP"
)]
struct Cli {
    /// Path to the gateway config file (YAML)
    #[arg(long, env = "TOOLBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file
    #[arg(long, env = "TOOLBRIDGE_LISTEN")]
    listen: Option<SocketAddr>,

    /// Additional directory to scan for tool module files (repeatable)
    #[arg(long = "catalog-dir")]
    catalog_dirs: Vec<PathBuf>,

    /// Additional tool module file to load (repeatable)
    #[arg(long = "catalog-file")]
    catalog_files: Vec<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "TOOLBRIDGE_LOG_JSON")]
    log_json: bool,

    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json, cli.verbose);

    let mut config = match &cli.config {
        Some(path) => config::load(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    config.catalog.dirs.extend(cli.catalog_dirs);
    config.catalog.files.extend(cli.catalog_files);

    let state = toolbridge_gateway::build_state(&config);
    if state.invoker.tool_count() == 0 {
        tracing::warn!("catalog is empty; the gateway will advertise no tools");
    }

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    tracing::info!(
        listen = %config.listen,
        tools = state.invoker.tool_count(),
        "gateway listening"
    );

    let sessions = Arc::clone(&state.sessions);
    axum::serve(listener, toolbridge_gateway::app(state))
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await
        .context("server terminated abnormally")?;
    Ok(())
}

fn init_tracing(json: bool, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

async fn shutdown_signal(sessions: Arc<SessionManager>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install the shutdown signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, closing open sessions");
    sessions.close_all();
}
