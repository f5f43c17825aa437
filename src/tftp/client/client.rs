use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::config::ClientConfig;
use crate::tftp::core::packet::{self, BLOCK_SIZE, DATAGRAM_SIZE};
use crate::tftp::core::{DataPacket, ErrorCode, Packet};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("server error {code}: {message}")]
    Remote { code: ErrorCode, message: String },
    #[error("no response after {0} attempts")]
    Timeout(u8),
}

/// TFTP client
///
/// Downloads only: the server it talks to is read-only.
///
/// # Example
///
/// ```rust,no_run
/// use rotftp::tftp::client::{Client, ClientConfig};
/// use std::path::Path;
///
/// # async fn demo() -> Result<(), rotftp::tftp::client::ClientError> {
/// let config = ClientConfig::new("192.168.1.100".parse().unwrap(), 69);
/// let client = Client::new(config);
///
/// client.download("remote.txt", Path::new("local.txt")).await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// Create a new TFTP client
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Download a file from the server into `local_file`, returning its size.
    pub async fn download(&self, remote_file: &str, local_file: &Path) -> Result<u64, ClientError> {
        log::info!("Downloading {} to {}", remote_file, local_file.display());

        let contents = self.get(remote_file).await?;
        tokio::fs::write(local_file, &contents).await?;

        log::info!("Download complete: {}", local_file.display());
        Ok(contents.len() as u64)
    }

    /// Download a file from the server into memory (RRQ - Read Request)
    pub async fn get(&self, remote_file: &str) -> Result<Vec<u8>, ClientError> {
        let server_addr = self.config.server_addr();
        let local_addr: SocketAddr = if server_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local_addr).await?;

        let rrq = packet::encode_read_request(remote_file, &self.config.mode);
        let (mut data, peer) = self.first_block(&socket, &rrq, server_addr).await?;

        // The server answers from a fresh port; only that port is ours now.
        socket.connect(peer).await?;

        let mut contents = Vec::new();
        let mut expected_block: u16 = 1;

        loop {
            if data.block_num == expected_block {
                contents.extend_from_slice(&data.data);
                socket.send(&packet::encode_ack(data.block_num)).await?;

                if data.data.len() < BLOCK_SIZE {
                    log::debug!("Transfer complete. Total bytes: {}", contents.len());
                    return Ok(contents);
                }

                expected_block = expected_block.wrapping_add(1);
            } else if data.block_num == expected_block.wrapping_sub(1) {
                // Our ACK got lost, the server resent the previous block.
                socket.send(&packet::encode_ack(data.block_num)).await?;
            } else {
                log::warn!(
                    "Received unexpected block {}, expected {}",
                    data.block_num,
                    expected_block
                );
            }

            data = self.next_block(&socket, expected_block).await?;
        }
    }

    /// Send the request until the first DATA packet arrives.
    async fn first_block(
        &self,
        socket: &UdpSocket,
        rrq: &[u8],
        server_addr: SocketAddr,
    ) -> Result<(DataPacket, SocketAddr), ClientError> {
        let mut buf = [0u8; DATAGRAM_SIZE];

        for _ in 0..self.config.retries {
            socket.send_to(rrq, server_addr).await?;

            let (len, peer) = match timeout(self.config.timeout, socket.recv_from(&mut buf)).await {
                Ok(received) => received?,
                Err(_) => continue,
            };

            match Self::expect_data(&buf[..len])? {
                Some(data) => return Ok((data, peer)),
                None => continue,
            }
        }

        Err(ClientError::Timeout(self.config.retries))
    }

    /// Wait for the next DATA packet, re-acknowledging the previous block on
    /// every timeout.
    async fn next_block(
        &self,
        socket: &UdpSocket,
        expected_block: u16,
    ) -> Result<DataPacket, ClientError> {
        let mut buf = [0u8; DATAGRAM_SIZE];
        let last_ack = packet::encode_ack(expected_block.wrapping_sub(1));

        for _ in 0..self.config.retries {
            let len = match timeout(self.config.timeout, socket.recv(&mut buf)).await {
                Ok(received) => received?,
                Err(_) => {
                    socket.send(&last_ack).await?;
                    continue;
                }
            };

            if let Some(data) = Self::expect_data(&buf[..len])? {
                return Ok(data);
            }
        }

        Err(ClientError::Timeout(self.config.retries))
    }

    /// `Some` for DATA, an error for ERROR, `None` for anything else.
    fn expect_data(buf: &[u8]) -> Result<Option<DataPacket>, ClientError> {
        match Packet::deserialize(buf) {
            Ok(Packet::Data(data)) => Ok(Some(data)),
            Ok(Packet::Error(err)) => Err(ClientError::Remote {
                code: err.code,
                message: err.message,
            }),
            Ok(_) => {
                log::warn!("Received unexpected packet type");
                Ok(None)
            }
            Err(e) => {
                log::warn!("Received bad packet: {}", e);
                Ok(None)
            }
        }
    }
}
