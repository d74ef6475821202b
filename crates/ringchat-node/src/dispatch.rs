//! Maps decoded frames to the events the node acts on.

use ringchat_core::wire::{Command, Frame, ProtocolError};
use ringchat_core::{ControlMessage, RingId};

/// Meaning of one received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Chat text attributed to `sender`.
    Chat { sender: String, text: String },
    /// A member announced it is leaving.
    Departed { id: String },
    /// A member finished joining.
    Arrived { id: String },
    /// Id handed to a joining node.
    AssignId(RingId),
    /// Splice or repoint instruction.
    Control(ControlMessage),
}

pub fn dispatch(frame: Frame) -> Result<Inbound, ProtocolError> {
    let Frame {
        command,
        sender_id,
        payload,
    } = frame;

    match command {
        Command::Print => Ok(Inbound::Chat {
            sender: sender_id,
            text: payload,
        }),
        Command::Disconnected => Ok(Inbound::Departed { id: payload }),
        Command::Connected => Ok(Inbound::Arrived { id: payload }),
        Command::AssignId => Ok(Inbound::AssignId(payload.parse()?)),
        Command::NewConnection => Ok(Inbound::Control(ControlMessage::parse(&payload)?)),
    }
}
