//! Santak RTU connector binary.
//!
//! Starts the device-facing TCP listener, the plugin management HTTP
//! API, the MQTT event loop, and the platform heartbeat task.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use santak_rtu::{create_router, AppState, Config, PlatformClient, TcpServer, VERSION};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "santak-rtu")]
#[command(version = VERSION)]
#[command(about = "Santak UPS TCP connector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the connector
    Serve {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Device-facing TCP port (overrides config)
        #[arg(long)]
        tcp_port: Option<u16>,

        /// Plugin HTTP port (overrides config)
        #[arg(long)]
        http_port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            tcp_port,
            http_port,
        } => serve(config, tcp_port, http_port).await,
    }
}

async fn serve(
    config_path: Option<PathBuf>,
    tcp_port: Option<u16>,
    http_port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    }
    .apply_env();

    if let Some(port) = tcp_port {
        config.server.tcp_port = port;
    }
    if let Some(port) = http_port {
        config.server.http_port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone())),
        )
        .init();

    tracing::info!(version = VERSION, "Santak RTU connector starting");
    tracing::info!(
        tcp_addr = %config.server.tcp_addr(),
        http_addr = %config.server.http_addr(),
        platform = %config.platform.base_url,
        mqtt_broker = %config.platform.mqtt_broker,
        "configuration loaded"
    );

    let (platform, mut event_loop) =
        PlatformClient::connect(&config.platform).context("connecting platform client")?;
    let platform = Arc::new(platform);

    // MQTT event loop: publishes only make progress while this polls.
    tokio::spawn(async move {
        loop {
            if let Err(err) = event_loop.poll().await {
                tracing::error!(%err, "MQTT connection error, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    });

    // Plugin heartbeat every 30 seconds; failures are logged only.
    {
        let platform = Arc::clone(&platform);
        let service_identifier = config.platform.service_identifier.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(30));
            loop {
                ticker.tick().await;
                match platform.send_heartbeat(&service_identifier).await {
                    Ok(()) => tracing::debug!("heartbeat sent"),
                    Err(err) => tracing::error!(%err, "heartbeat failed"),
                }
            }
        });
    }

    // Plugin management HTTP API.
    let state = Arc::new(AppState::new(Arc::clone(&platform)));
    let router = create_router(state).layer(TraceLayer::new_for_http());
    let http_addr = config.server.http_addr();
    tokio::spawn(async move {
        tracing::info!(addr = %http_addr, "HTTP server listening");
        match tokio::net::TcpListener::bind(&http_addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, router).await {
                    tracing::error!(%err, "HTTP server error");
                }
            }
            Err(err) => tracing::error!(addr = %http_addr, %err, "failed to bind HTTP server"),
        }
    });

    // Device-facing TCP listener runs in the foreground.
    let server = TcpServer::bind(&config.server.tcp_addr(), platform)
        .await
        .context("binding device TCP listener")?;

    tokio::select! {
        result = server.run() => result.context("TCP server failed"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}
