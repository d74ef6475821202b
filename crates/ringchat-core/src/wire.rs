//! RingChat wire format: the frame every peer exchanges with its neighbors.
//!
//! A frame is a fixed 5-byte header followed by a variable body:
//!
//! ```text
//! ┌─────────┬───────────┬──────────────┬───────────┬─────────┐
//! │ command │ total_len │ sender_id_len│ sender_id │ payload │
//! │ u8      │ u16 LE    │ u16 LE       │ UTF-8     │ UTF-8   │
//! └─────────┴───────────┴──────────────┴───────────┴─────────┘
//! ```
//!
//! `total_len` covers sender_id and payload together, so a body can never
//! exceed 65535 bytes. Relays forward frames byte-for-byte; the CRC-32 of
//! the full encoding is the frame's identity for deduplication.

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Header ────────────────────────────────────────────────────────────────────

/// On-wire frame header.
///
/// Wire size: 5 bytes. All fields are byte-aligned so the struct has no
/// padding and can be read straight out of a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct FrameHeader {
    /// Raw command byte. Validated against [`Command`] after the body is read.
    pub command: u8,

    /// Combined length of sender_id and payload.
    pub total_len: U16<LittleEndian>,

    /// Length of the sender_id prefix of the body.
    pub sender_id_len: U16<LittleEndian>,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(FrameHeader, [u8; 5]);

impl FrameHeader {
    pub fn total_len(&self) -> usize {
        self.total_len.get() as usize
    }

    pub fn sender_id_len(&self) -> usize {
        self.sender_id_len.get() as usize
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// The closed set of frame commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Chat text attributed to the sender.
    Print = 0,
    /// A peer left the ring. Payload: the departing peer's id.
    Disconnected = 1,
    /// A peer joined the ring. Payload: the arriving peer's id.
    Connected = 2,
    /// Id assignment for a joining peer. Payload: decimal id.
    AssignId = 3,
    /// Ring splice / repoint control. Payload: sub-tag + `host:port`.
    NewConnection = 4,
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Command::Print),
            1 => Ok(Command::Disconnected),
            2 => Ok(Command::Connected),
            3 => Ok(Command::AssignId),
            4 => Ok(Command::NewConnection),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

impl From<Command> for u8 {
    fn from(c: Command) -> u8 {
        c as u8
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Size of [`FrameHeader`] on the wire.
pub const HEADER_LEN: usize = 5;

/// Maximum combined sender_id + payload length.
pub const MAX_BODY: usize = u16::MAX as usize;

/// Default wait for the first reply from the entry point during a join.
pub const JOIN_TIMEOUT_SECS: u64 = 15;

/// Default timeout for control dials and link greetings.
pub const CONTROL_TIMEOUT_SECS: u64 = 5;

/// Default timeout for a frame body (once its header arrived) and for writes.
pub const RELAY_TIMEOUT_SECS: u64 = 2;

// ── Frame ─────────────────────────────────────────────────────────────────────

/// A decoded frame. Has no identity beyond its encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub sender_id: String,
    pub payload: String,
}

impl Frame {
    pub fn new(command: Command, sender_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            command,
            sender_id: sender_id.into(),
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, FramingError> {
        encode(self.command, &self.sender_id, &self.payload)
    }

    /// Decode a complete frame (header + body) as received from a link.
    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        let header = decode_header(raw)?;
        let (sender_id, payload) =
            decode_body(&raw[HEADER_LEN..], header.total_len(), header.sender_id_len())?;
        let command = Command::try_from(header.command)?;
        Ok(Self {
            command,
            sender_id,
            payload,
        })
    }
}

/// Encode a frame. Fails if the body does not fit the 16-bit length field.
pub fn encode(command: Command, sender_id: &str, payload: &str) -> Result<Bytes, FramingError> {
    let total = sender_id.len() + payload.len();
    if total > MAX_BODY {
        return Err(FramingError::Oversize(total));
    }

    let header = FrameHeader {
        command: command.into(),
        total_len: U16::new(total as u16),
        sender_id_len: U16::new(sender_id.len() as u16),
    };

    let mut buf = BytesMut::with_capacity(HEADER_LEN + total);
    buf.put_slice(header.as_bytes());
    buf.put_slice(sender_id.as_bytes());
    buf.put_slice(payload.as_bytes());
    Ok(buf.freeze())
}

/// Read the fixed header from the front of `bytes`.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, FramingError> {
    FrameHeader::read_from_prefix(bytes).ok_or(FramingError::ShortHeader(bytes.len()))
}

/// Split a body into (sender_id, payload).
///
/// Bytes beyond `total_len` are ignored; the caller owns framing of the
/// stream.
pub fn decode_body(
    body: &[u8],
    total_len: usize,
    sender_id_len: usize,
) -> Result<(String, String), FramingError> {
    if body.len() < total_len {
        return Err(FramingError::ShortBody {
            expected: total_len,
            actual: body.len(),
        });
    }
    if sender_id_len > total_len {
        return Err(FramingError::SenderIdOverrun {
            sender_id_len,
            total_len,
        });
    }

    let sender_id = std::str::from_utf8(&body[..sender_id_len])
        .map_err(|_| FramingError::InvalidUtf8)?
        .to_owned();
    let payload = std::str::from_utf8(&body[sender_id_len..total_len])
        .map_err(|_| FramingError::InvalidUtf8)?
        .to_owned();
    Ok((sender_id, payload))
}

/// Dedup key of an encoded frame: CRC-32 over every byte, header included.
pub fn fingerprint(raw: &[u8]) -> u32 {
    crc32fast::hash(raw)
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// A frame whose bytes cannot be split into header and body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("header needs {} bytes, got {0}", HEADER_LEN)]
    ShortHeader(usize),

    #[error("body needs {expected} bytes, got {actual}")]
    ShortBody { expected: usize, actual: usize },

    #[error("sender id length {sender_id_len} exceeds body length {total_len}")]
    SenderIdOverrun {
        sender_id_len: usize,
        total_len: usize,
    },

    #[error("body length {0} exceeds maximum {}", MAX_BODY)]
    Oversize(usize),

    #[error("frame text is not valid UTF-8")]
    InvalidUtf8,
}

/// A well-formed frame that makes no sense to the ring protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown command byte: 0x{0:02x}")]
    UnknownCommand(u8),

    #[error("malformed control payload: {0:?}")]
    MalformedControl(String),

    #[error("invalid peer address: {0:?}")]
    InvalidAddress(String),

    #[error("invalid ring id: {0:?}")]
    InvalidId(String),

    #[error("unexpected greeting from {0}")]
    UnexpectedGreeting(String),

    #[error("{event} is invalid while {state}")]
    InvalidForState { event: &'static str, state: String },
}

/// Anything that can go wrong turning raw bytes into a [`Frame`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
