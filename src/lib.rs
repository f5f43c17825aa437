//! Read-only TFTP server and supporting tools
//!
//! The server hands one in-memory payload to every client that sends a read
//! request, in 512-byte lock-step blocks with timeout-driven retransmission.

pub mod checksum;
pub mod tftp;
