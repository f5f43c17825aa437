use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::tftp::core::OCTET_MODE;

/// TFTP client configuration
///
/// # Example
///
/// ```rust
/// use rotftp::tftp::client::ClientConfig;
///
/// let config = ClientConfig::new("192.168.1.100".parse().unwrap(), 69);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server IP address
    pub server_ip: IpAddr,
    /// Server port number
    pub server_port: u16,
    /// Time to wait for each response
    pub timeout: Duration,
    /// Attempts before giving up on a response
    pub retries: u8,
    /// Transfer mode (only octet is served)
    pub mode: String,
}

impl ClientConfig {
    /// Create new client configuration
    ///
    /// # Arguments
    ///
    /// * `server_ip` - Server IP address
    /// * `server_port` - Server port number (usually 69)
    pub fn new(server_ip: IpAddr, server_port: u16) -> Self {
        Self {
            server_ip,
            server_port,
            timeout: Duration::from_secs(5),
            retries: 5,
            mode: OCTET_MODE.to_string(),
        }
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.server_port)
    }

    /// Set timeout duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of attempts per response
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries.max(1);
        self
    }
}

impl From<SocketAddr> for ClientConfig {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}
