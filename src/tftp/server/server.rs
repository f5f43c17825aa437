use std::future::{self, Future};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::UdpSocket;

use super::worker::{TransferError, Worker};
use crate::tftp::core::packet::{self, DATAGRAM_SIZE};
use crate::tftp::core::{ReadRequest, TransferOptions, connect_ephemeral};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Read-only TFTP server
///
/// Every read request is answered with the same in-memory payload,
/// whatever file name the client asks for. The listening socket only ever
/// receives requests; each transfer runs on its own task and socket.
pub struct Server {
    payload: Arc<[u8]>,
    options: TransferOptions,
}

impl Server {
    /// Create a server for `payload`.
    ///
    /// Fails with [`ServerError::Configuration`] when no payload (or an empty
    /// one) is given. Zero retries or a zero timeout fall back to the
    /// defaults.
    pub fn new(payload: Option<Arc<[u8]>>, options: TransferOptions) -> Result<Self, ServerError> {
        let payload = payload
            .filter(|payload| !payload.is_empty())
            .ok_or_else(|| ServerError::Configuration("payload is required".to_string()))?;

        Ok(Self {
            payload,
            options: options.normalized(),
        })
    }

    pub fn options(&self) -> TransferOptions {
        self.options
    }

    /// Bind `addr` and serve until the socket fails.
    pub async fn listen_and_serve(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let socket = UdpSocket::bind(addr).await?;
        log::info!("Listening on {} ...", socket.local_addr()?);

        self.serve(socket).await
    }

    /// Serve requests arriving on `socket` until receiving from it fails.
    pub async fn serve(&self, socket: UdpSocket) -> Result<(), ServerError> {
        self.serve_with_shutdown(socket, future::pending()).await
    }

    /// Serve requests until `shutdown` resolves, then close the socket.
    ///
    /// Transfers already in flight are not cancelled; they finish or fail on
    /// their own.
    pub async fn serve_with_shutdown<F>(
        &self,
        socket: UdpSocket,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let local = socket.local_addr()?;
        let mut buf = [0u8; DATAGRAM_SIZE];
        tokio::pin!(shutdown);

        loop {
            let (len, client) = tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Closing listener on {}", local);
                    return Ok(());
                }
                received = socket.recv_from(&mut buf) => received?,
            };

            let rrq = match packet::decode_read_request(&buf[..len]) {
                Ok(rrq) => rrq,
                Err(e) => {
                    log::warn!("[{}] bad request: {}", client, e);
                    continue;
                }
            };

            self.spawn_transfer(local, client, rrq);
        }
    }

    fn spawn_transfer(&self, local: SocketAddr, client: SocketAddr, rrq: ReadRequest) {
        log::info!("[{}] request file: {}", client, rrq.filename);

        let payload = Arc::clone(&self.payload);
        let options = self.options;

        tokio::spawn(async move {
            let socket = match connect_ephemeral(local, client).await {
                Ok(socket) => socket,
                Err(e) => {
                    log::error!("[{}] dial: {}", client, e);
                    return;
                }
            };

            match Worker::new(socket, payload, options).send_file().await {
                Ok(summary) => {
                    log::info!(
                        "[{}] sent {} blocks ({} bytes)",
                        client,
                        summary.blocks,
                        summary.bytes
                    )
                }
                Err(TransferError::RetriesExhausted { .. }) => {
                    log::warn!("[{}] exhausted retries", client)
                }
                Err(e) => log::error!("[{}] {}", client, e),
            }
        });
    }
}
