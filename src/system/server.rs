//! Server mode
//!
//! Wires storage, signer and entry store together, serves HTTP until a
//! shutdown signal, then drains visits and closes the backend.

use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::{Compress, DefaultHeaders};
use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::shutdown::listen_for_shutdown;
use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::storage::StorageFactory;
use crate::store::{EntryStore, Signer};

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Run the HTTP server
///
/// **Note**: logging must be initialized before calling this function
pub async fn run_server(config: Arc<AppConfig>) -> Result<()> {
    let storage = StorageFactory::create(&config).await?;
    let backend = storage.get_backend_config();
    info!(
        "Using storage backend: {} (derived visit count: {})",
        backend.storage_type, backend.derives_visit_count
    );

    let signer = Signer::from_config(&config.security)?;
    let store = Arc::new(EntryStore::new(storage, signer, &config.store));
    debug!("Entry store ready, id length {}", store.id_length());

    let state = AppState {
        store: Arc::clone(&store),
        config: Arc::clone(&config),
    };

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::PayloadConfig::new(64 * 1024))
            .wrap(Compress::default())
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-cache, no-store, must-revalidate")))
            .configure(api::configure)
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .workers(cpu_count)
    .disable_signals()
    .bind(&bind_address)
    .with_context(|| format!("could not bind {}", bind_address))?
    .run();

    let handle = server.handle();
    warn!("Starting server at http://{}", bind_address);

    tokio::select! {
        res = server => {
            res.context("HTTP server failed")?;
        }
        _ = listen_for_shutdown() => {
            handle.stop(true).await;
        }
    }

    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), store.close()).await {
        Ok(Ok(())) => info!("All shutdown tasks completed successfully"),
        Ok(Err(e)) => error!("Error while closing the entry store: {}", e),
        Err(_) => error!(
            "Shutdown tasks timed out after {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }

    Ok(())
}
