// SPDX-License-Identifier: GPL-3.0-only
mod api;
mod cluster;
mod config;
mod controller;
mod error;
mod logging;
mod registry;
mod session;
mod store;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use api::HttpServer;
use config::{Config, StoreBackend};
use error::MapLoadError;
use logging::setup_logging;
use session::{Session, SessionSettings};
use store::{FirebaseStore, MemoryStore, RemoteStore};

fn build_store(config: &Config) -> Result<Arc<dyn RemoteStore>, MapLoadError> {
    match config.store_backend {
        StoreBackend::Firebase => {
            let store = FirebaseStore::new(
                &config.store_url,
                config.store_auth_token.clone(),
                config.reconnect_delay(),
            )?;
            info!(url = %config.store_url, "Using Realtime Database store");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level, config.log_json)?;

    info!("Starting questmap v{}", env!("CARGO_PKG_VERSION"));

    // Bring up the map session; a load failure leaves it in the failed state
    let settings = SessionSettings::from_config(&config);
    let session = match build_store(&config) {
        Ok(store) => Session::start(store, settings).await,
        Err(e) => Session::failed(&e, settings),
    };
    info!(collection = %config.collection, "Session initialized");

    // Start HTTP + WebSocket server
    let http_server = HttpServer::new(session.handle(), config.local_api_bind);
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.serve().await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("All services started. Waiting for shutdown signal...");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!(error = %err, "Unable to listen for shutdown signal");
        }
    }

    // Graceful shutdown
    info!("Initiating graceful shutdown...");

    http_task.abort();
    session.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_config;

    #[test]
    fn test_build_memory_store() {
        let config = create_test_config();
        assert!(build_store(&config).is_ok());
    }

    #[test]
    fn test_build_store_rejects_bad_url() {
        let mut config = create_test_config();
        config.store_backend = StoreBackend::Firebase;
        config.store_url = "not a url".to_string();

        let err = build_store(&config).err().unwrap();
        assert!(matches!(err, MapLoadError::InvalidStoreUrl { .. }));
    }
}
