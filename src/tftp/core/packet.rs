//! TFTP packet serialization and deserialization
//!
//! Wire layouts, all integers big-endian:
//!
//! ```text
//! RRQ    | 01 | filename | 0 | mode | 0 |
//! DATA   | 03 | block #  | payload (0-512 bytes) |
//! ACK    | 04 | block #  |
//! ERROR  | 05 | code     | message | 0 |
//! ```
//!
//! Every function here is pure. Block sequencing lives in the server worker;
//! [`encode_data`] only takes the previous block number and hands back the
//! next one.

use std::fmt;
use std::io::{self, Read};

use thiserror::Error;

use super::convert::Convert;

/// Maximum size of a TFTP datagram: 4 header bytes plus one block
pub const DATAGRAM_SIZE: usize = 516;
/// Maximum payload carried by a single DATA packet
pub const BLOCK_SIZE: usize = DATAGRAM_SIZE - 4;
/// The only supported transfer mode
pub const OCTET_MODE: &str = "octet";

/// Decode failures. All of them are structural: the datagram is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("invalid RRQ: {0}")]
    InvalidRequest(String),
    #[error("invalid DATA: {0}")]
    InvalidData(String),
    #[error("invalid ACK: {0}")]
    InvalidAck(String),
    #[error("invalid ERROR: {0}")]
    InvalidError(String),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),
    #[error("packet too short for an opcode")]
    Truncated,
}

/// First two bytes of every packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OpCode {
    Rrq = 1,
    /// Reserved, write requests are never served
    Wrq = 2,
    Data = 3,
    Ack = 4,
    Error = 5,
}

impl OpCode {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(OpCode::Rrq),
            2 => Some(OpCode::Wrq),
            3 => Some(OpCode::Data),
            4 => Some(OpCode::Ack),
            5 => Some(OpCode::Error),
            _ => None,
        }
    }

    /// Reads the opcode of a raw datagram without decoding the rest.
    pub fn peek(buf: &[u8]) -> Option<Self> {
        Convert::to_u16(buf, 0).and_then(Self::from_u16)
    }

    fn check(buf: &[u8], expected: OpCode) -> bool {
        Convert::to_u16(buf, 0) == Some(expected as u16)
    }
}

/// Error codes carried by ERROR packets (RFC 1350 section 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    Unknown = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    FileAlreadyExists = 6,
    NoSuchUser = 7,
}

impl ErrorCode {
    /// Codes outside the RFC range collapse to [`ErrorCode::Unknown`].
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            3 => ErrorCode::DiskFull,
            4 => ErrorCode::IllegalOperation,
            5 => ErrorCode::UnknownTransferId,
            6 => ErrorCode::FileAlreadyExists,
            7 => ErrorCode::NoSuchUser,
            _ => ErrorCode::Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::Unknown => "not defined",
            ErrorCode::FileNotFound => "file not found",
            ErrorCode::AccessViolation => "access violation",
            ErrorCode::DiskFull => "disk full",
            ErrorCode::IllegalOperation => "illegal operation",
            ErrorCode::UnknownTransferId => "unknown transfer id",
            ErrorCode::FileAlreadyExists => "file already exists",
            ErrorCode::NoSuchUser => "no such user",
        };
        write!(f, "{} ({})", text, *self as u16)
    }
}

/// A decoded read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub filename: String,
    pub mode: String,
}

/// A decoded DATA packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub block_num: u16,
    pub data: Vec<u8>,
}

/// A decoded ERROR packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPacket {
    pub code: ErrorCode,
    pub message: String,
}

/// Any packet this crate understands, dispatched on its opcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Rrq(ReadRequest),
    Data(DataPacket),
    Ack(u16),
    Error(ErrorPacket),
}

impl Packet {
    /// Serialize to wire format
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Packet::Rrq(rrq) => encode_read_request(&rrq.filename, &rrq.mode),
            Packet::Data(data) => data.serialize(),
            Packet::Ack(block_num) => encode_ack(*block_num),
            Packet::Error(err) => encode_error(err.code, &err.message),
        }
    }

    /// Deserialize from wire format
    pub fn deserialize(buf: &[u8]) -> Result<Self, PacketError> {
        let opcode = Convert::to_u16(buf, 0).ok_or(PacketError::Truncated)?;

        match OpCode::from_u16(opcode) {
            Some(OpCode::Rrq) => decode_read_request(buf).map(Packet::Rrq),
            Some(OpCode::Wrq) => Err(PacketError::InvalidRequest(
                "write requests are not supported".to_string(),
            )),
            Some(OpCode::Data) => decode_data(buf).map(Packet::Data),
            Some(OpCode::Ack) => decode_ack(buf).map(Packet::Ack),
            Some(OpCode::Error) => decode_error(buf).map(Packet::Error),
            None => Err(PacketError::UnknownOpcode(opcode)),
        }
    }
}

/// Encodes an RRQ. An empty `mode` is sent as `octet`.
pub fn encode_read_request(filename: &str, mode: &str) -> Vec<u8> {
    let mode = if mode.is_empty() { OCTET_MODE } else { mode };

    let mut buf = Vec::with_capacity(2 + filename.len() + 1 + mode.len() + 1);
    buf.extend_from_slice(&(OpCode::Rrq as u16).to_be_bytes());
    Convert::push_string(&mut buf, filename);
    Convert::push_string(&mut buf, mode);
    buf
}

/// Decodes an RRQ, accepting only the `octet` mode (any case).
///
/// Bytes after the mode terminator (RFC 2347 options) are ignored.
pub fn decode_read_request(buf: &[u8]) -> Result<ReadRequest, PacketError> {
    if !OpCode::check(buf, OpCode::Rrq) {
        return Err(PacketError::InvalidRequest("opcode mismatch".to_string()));
    }

    let (filename, offset) = Convert::to_request_field(buf, 2, "filename")?;
    let (mode, _) = Convert::to_request_field(buf, offset, "mode")?;

    if !mode.eq_ignore_ascii_case(OCTET_MODE) {
        return Err(PacketError::InvalidRequest(
            "only binary transfers supported".to_string(),
        ));
    }

    Ok(ReadRequest { filename, mode })
}

/// Frames the next DATA block from `payload`.
///
/// `block_num` is the number of the previously sent block; it is incremented
/// (wrapping) before encoding, so a fresh transfer starting at 0 sends
/// block 1. Up to [`BLOCK_SIZE`] bytes are consumed from `payload`. Running
/// out of input is not an error: a short or empty block marks the end of the
/// transfer.
pub fn encode_data<R: Read>(block_num: u16, payload: &mut R) -> io::Result<(Vec<u8>, u16)> {
    let block_num = block_num.wrapping_add(1);

    let mut buf = Vec::with_capacity(DATAGRAM_SIZE);
    buf.extend_from_slice(&(OpCode::Data as u16).to_be_bytes());
    buf.extend_from_slice(&block_num.to_be_bytes());
    payload.take(BLOCK_SIZE as u64).read_to_end(&mut buf)?;

    Ok((buf, block_num))
}

pub fn decode_data(buf: &[u8]) -> Result<DataPacket, PacketError> {
    if buf.len() < 4 || buf.len() > DATAGRAM_SIZE {
        return Err(PacketError::InvalidData(format!(
            "length {} outside 4..={}",
            buf.len(),
            DATAGRAM_SIZE
        )));
    }
    if !OpCode::check(buf, OpCode::Data) {
        return Err(PacketError::InvalidData("opcode mismatch".to_string()));
    }

    let block_num = Convert::to_u16(buf, 2)
        .ok_or_else(|| PacketError::InvalidData("missing block number".to_string()))?;

    Ok(DataPacket {
        block_num,
        data: buf[4..].to_vec(),
    })
}

impl DataPacket {
    /// Serialize with the block number as stored, no increment.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.data.len());
        buf.extend_from_slice(&(OpCode::Data as u16).to_be_bytes());
        buf.extend_from_slice(&self.block_num.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }
}

pub fn encode_ack(block_num: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4);
    buf.extend_from_slice(&(OpCode::Ack as u16).to_be_bytes());
    buf.extend_from_slice(&block_num.to_be_bytes());
    buf
}

/// Decodes an ACK, returning the acknowledged block number.
pub fn decode_ack(buf: &[u8]) -> Result<u16, PacketError> {
    if !OpCode::check(buf, OpCode::Ack) {
        return Err(PacketError::InvalidAck("opcode mismatch".to_string()));
    }

    Convert::to_u16(buf, 2)
        .ok_or_else(|| PacketError::InvalidAck("missing block number".to_string()))
}

pub fn encode_error(code: ErrorCode, message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + message.len() + 1);
    buf.extend_from_slice(&(OpCode::Error as u16).to_be_bytes());
    buf.extend_from_slice(&(code as u16).to_be_bytes());
    Convert::push_string(&mut buf, message);
    buf
}

pub fn decode_error(buf: &[u8]) -> Result<ErrorPacket, PacketError> {
    if !OpCode::check(buf, OpCode::Error) {
        return Err(PacketError::InvalidError("opcode mismatch".to_string()));
    }

    let code = Convert::to_u16(buf, 2)
        .map(ErrorCode::from_u16)
        .ok_or_else(|| PacketError::InvalidError("missing error code".to_string()))?;
    let (message, _) = Convert::to_string(buf, 4)
        .ok_or_else(|| PacketError::InvalidError("unterminated message".to_string()))?;

    Ok(ErrorPacket { code, message })
}
