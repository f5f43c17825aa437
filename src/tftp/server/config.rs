use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::tftp::core::TransferOptions;
use crate::tftp::core::options::{DEFAULT_RETRIES, DEFAULT_TIMEOUT};

/// File served when nothing else is configured
pub const DEFAULT_PAYLOAD: &str = "payload.svg";

/// TFTP server configuration
///
/// Loaded from an optional TOML file and then overridden by command line
/// values.
///
/// # Example
///
/// ```toml
/// address = "0.0.0.0:69"
/// payload = "/srv/tftp/boot.img"
/// retries = 5
/// timeout = "2s"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the listener binds to
    pub address: SocketAddr,
    /// File whose contents are served to every client
    pub payload: Option<PathBuf>,
    /// Send attempts per block
    pub retries: u8,
    /// Time to wait for each acknowledgement
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Config {
    pub fn with_defaults() -> Self {
        Self {
            address: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 69),
            payload: Some(PathBuf::from(DEFAULT_PAYLOAD)),
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Load a TOML configuration file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Defaults, or the contents of `path` when one is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::with_defaults()),
        }
    }

    /// Apply command line overrides; `None` keeps the current value.
    pub fn merge_cli(
        mut self,
        address: Option<SocketAddr>,
        payload: Option<PathBuf>,
        retries: Option<u8>,
        timeout: Option<Duration>,
    ) -> Self {
        if let Some(address) = address {
            self.address = address;
        }
        if let Some(payload) = payload {
            self.payload = Some(payload);
        }
        if let Some(retries) = retries {
            self.retries = retries;
        }
        if let Some(timeout) = timeout {
            self.timeout = timeout;
        }
        self
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions::new(self.retries, self.timeout).normalized()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_defaults()
    }
}
