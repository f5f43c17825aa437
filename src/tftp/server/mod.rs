//! TFTP server implementation
//!
//! This module provides the read-only TFTP server:
//! - `server`: Listener, accepts read requests and spawns transfers
//! - `worker`: Per-client transfer with retransmission
//! - `config`: Server configuration

mod config;
mod server;
mod worker;

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::net::UdpSocket;

// Public server types
pub use config::{Config, DEFAULT_PAYLOAD};
pub use server::{Server, ServerError};
pub use worker::{TransferError, TransferSummary, Worker};

/// Run the TFTP server until Ctrl+C
pub async fn run(config: Config) -> Result<()> {
    run_with_shutdown(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Run the TFTP server until `shutdown` resolves
pub async fn run_with_shutdown<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let options = config.transfer_options();

    log::info!("Starting TFTP server on {}", config.address);
    log::info!("Retries: {}, timeout: {:?}", options.retries, options.timeout);

    let payload: Option<Arc<[u8]>> = match &config.payload {
        Some(path) => {
            log::info!("Payload: {}", path.display());
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read payload {}", path.display()))?;
            Some(bytes.into())
        }
        None => None,
    };

    let server = Server::new(payload, options)?;

    let socket = UdpSocket::bind(config.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.address))?;
    log::info!("Listening on {}, press Ctrl+C to stop", socket.local_addr()?);

    server.serve_with_shutdown(socket, shutdown).await?;
    log::info!("TFTP server stopped");

    Ok(())
}
