//! TFTP (Trivial File Transfer Protocol) implementation
//!
//! A read-only subset of [RFC 1350](https://www.rfc-editor.org/rfc/rfc1350):
//! read requests in octet mode, 512-byte blocks, one outstanding block per
//! transfer. Write requests and option negotiation are not supported.
//!
//! ## Module Structure
//!
//! ```text
//! tftp/
//! ├── core/           # Core protocol implementation
//! │   ├── packet      # Packet serialization/deserialization
//! │   ├── socket      # Socket abstraction layer
//! │   ├── options     # Local transfer options
//! │   └── convert     # Byte conversion utilities
//! │
//! ├── server/         # TFTP server
//! │   ├── server      # Listener, one task per request
//! │   ├── worker      # Per-client transfer
//! │   └── config      # Server configuration
//! │
//! └── client/         # TFTP client (downloads only)
//! ```
//!
//! ## Usage Examples
//!
//! ### Start TFTP Server
//!
//! ```rust,no_run
//! use rotftp::tftp::core::TransferOptions;
//! use rotftp::tftp::server::Server;
//!
//! # async fn demo() -> Result<(), rotftp::tftp::server::ServerError> {
//! let payload = std::fs::read("payload.svg")?;
//! let server = Server::new(Some(payload.into()), TransferOptions::default())?;
//! server.listen_and_serve("127.0.0.1:69".parse().unwrap()).await?;
//! # Ok(())
//! # }
//! ```

// Submodules
pub mod client;
pub mod core;
pub mod server;
