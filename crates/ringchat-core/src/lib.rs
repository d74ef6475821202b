//! ringchat-core: wire format, addresses, control payloads and dedup history.
//! Every other RingChat crate depends on this one.

pub mod address;
pub mod config;
pub mod control;
pub mod dedup;
pub mod wire;

pub use address::{PeerAddress, RingId};
pub use control::ControlMessage;
pub use dedup::DedupHistory;
pub use wire::{Command, Frame, FramingError, ProtocolError, WireError};
