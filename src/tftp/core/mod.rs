//! TFTP core protocol implementation
//!
//! This module contains the core components of the TFTP protocol:
//! - `packet`: Packet serialization and deserialization
//! - `socket`: Socket abstraction layer
//! - `options`: Local transfer options (retries, timeout)
//! - `convert`: Byte conversion utilities

mod convert;
pub mod options;
pub mod packet;
mod socket;

// Public core types
pub use convert::Convert;
pub use options::TransferOptions;
pub use packet::{
    BLOCK_SIZE, DATAGRAM_SIZE, DataPacket, ErrorCode, ErrorPacket, OCTET_MODE, OpCode, Packet,
    PacketError, ReadRequest,
};
pub use socket::{Socket, connect_ephemeral};
