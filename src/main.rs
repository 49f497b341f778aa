//! Collaboration gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │              COLLABORATION GATEWAY            │
//!   Browser              │                                               │
//!   ─────────────────────┼─▶ net::listener ─▶ net::connection (hyper)    │
//!                        │                        │                      │
//!                        │                        ▼                      │
//!                        │              http::server (axum router)       │
//!                        │               │ cors gate      │              │
//!                        │               ▼                ▼              │
//!                        │        http::projects   session::upgrade      │
//!                        │               │                │ 101          │
//!                        │               ▼                ▼              │
//!                        │           store ◀── liveness ◀─ session ─▶ sync engine
//!                        │      (redis / memory)                         │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use collab_gateway::config::{load_startup_config, watcher::ConfigWatcher, ExistenceCheck};
use collab_gateway::http::{GatewayServer, GatewayState};
use collab_gateway::lifecycle::{spawn_signal_handler, Shutdown};
use collab_gateway::net::Listener;
use collab_gateway::observability::{logging::init_tracing, GatewayMetrics};
use collab_gateway::session::RelayEngine;
use collab_gateway::store::open_store;

#[derive(Parser)]
#[command(name = "collab-gateway", version, about = "Collaboration gateway for shared documents")]
struct Args {
    /// Optional TOML config file; watched for allow-list changes.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_startup_config(args.config.as_deref())?;
    init_tracing(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        room_check = %config.rooms.existence_check,
        allowed_origins = config.cors.allowed_origins.len(),
        "collab-gateway starting"
    );

    if config.rooms.existence_check == ExistenceCheck::Permissive {
        tracing::warn!("Permissive room admission enabled: any well-formed room token is accepted");
    }

    let store = open_store(&config.store)?;
    let metrics = GatewayMetrics::new();
    let shutdown = Arc::new(Shutdown::new());
    let state = GatewayState::new(
        &config,
        store,
        Arc::new(RelayEngine::default()),
        metrics,
        Arc::clone(&shutdown),
    );

    // Keep the watcher alive for the life of the process.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let allow_list = state.allow_list.clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    allow_list.replace(&new_config.cors.allowed_origins);
                    tracing::info!(
                        allowed_origins = allow_list.len(),
                        "Origin allow-list reloaded"
                    );
                }
            });
            Some(watcher.run()?)
        }
        None => None,
    };

    let listener = Listener::bind(&config.listener).await?;
    spawn_signal_handler(Arc::clone(&shutdown));

    GatewayServer::new(&config, state).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
