use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use speak_gateway::{ServerConfig, routes, state::AppState};

#[derive(Parser, Debug)]
#[command(name = "speak-gateway")]
#[command(version, about = "WebSocket bridge to streaming text-to-speech", long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading configuration; missing file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Needed by tokio-tungstenite for wss:// connections to the speech service
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let address = config.address();
    let default_model = config.default_speak_model.clone();

    let app_state = AppState::new(config).map_err(|e| anyhow!(e.to_string()))?;
    let shutdown = app_state.shutdown.clone();

    let app = routes::create_app(app_state);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    info!(default_model = %default_model, "Server listening on http://{}", socket_addr);

    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl-C, then cancel every running relay.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, closing connections");
    shutdown.cancel();
}
