//! Socket abstraction layer
//!
//! A transfer only ever talks to one peer, so the worker needs nothing more
//! than connected send/receive. [`Socket`] captures that so the worker can be
//! driven by something other than a real UDP socket.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Datagram transport bound to a single peer
pub trait Socket: Send + Sync {
    /// Sends one datagram to the peer.
    fn send(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Receives one datagram from the peer.
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Address of the peer.
    fn remote_addr(&self) -> io::Result<SocketAddr>;
}

impl Socket for UdpSocket {
    fn send(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send {
        UdpSocket::send(self, buf)
    }

    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send {
        UdpSocket::recv(self, buf)
    }

    fn remote_addr(&self) -> io::Result<SocketAddr> {
        self.peer_addr()
    }
}

/// Binds an ephemeral socket on `local_ip` and connects it to `peer`.
///
/// Each transfer gets its own socket, so the peer sees a fresh transfer id
/// (port) for every request.
pub async fn connect_ephemeral(local: SocketAddr, peer: SocketAddr) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind(SocketAddr::new(local.ip(), 0)).await?;
    socket.connect(peer).await?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ephemeral_socket_reaches_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();

        let socket = connect_ephemeral("127.0.0.1:69".parse().unwrap(), peer_addr)
            .await
            .unwrap();
        assert_eq!(socket.remote_addr().unwrap(), peer_addr);
        assert_ne!(socket.local_addr().unwrap().port(), 69);

        Socket::send(&socket, b"hello").await.unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, socket.local_addr().unwrap());
    }
}
