//! TFTP client
//!
//! A minimal downloader, mostly useful for checking a running server.

mod client;
mod config;

pub use client::{Client, ClientError};
pub use config::ClientConfig;
