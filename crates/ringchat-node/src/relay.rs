//! Flood relay with fingerprint deduplication.
//!
//! Every flooded frame a node sees, whether received or originated, is
//! recorded by fingerprint. A frame whose fingerprint is already recorded has
//! finished its trip through this node and is dropped. New frames are
//! dispatched and forwarded unchanged to the neighbor opposite the one they
//! came from.
//!
//! Frames whose meaning ends at the hop that receives them never enter the
//! history. They travel one link and cannot loop, and their bytes repeat:
//! the same node answers every splice with the same frame.

use bytes::Bytes;

use ringchat_core::wire::{self, fingerprint, Command, Frame, FramingError, WireError};
use ringchat_core::DedupHistory;

use crate::link::Direction;

/// What to do with a received frame.
#[derive(Debug)]
pub enum Verdict {
    /// Seen before. Drop without dispatching or forwarding.
    Duplicate,
    /// First sighting but undecodable. Recorded, then dropped.
    Malformed(WireError),
    /// First sighting. Dispatch it, then forward if `forward` is set.
    Deliver {
        frame: Frame,
        forward: Option<Direction>,
    },
}

/// Frames whose semantics terminate at the hop that receives them.
fn terminates_here(command: Command) -> bool {
    match command {
        Command::NewConnection | Command::AssignId => true,
        Command::Print | Command::Disconnected | Command::Connected => false,
    }
}

#[derive(Debug, Default)]
pub struct Relay {
    history: DedupHistory,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_receive(&mut self, raw: &[u8], from: Direction) -> Verdict {
        let fp = fingerprint(raw);
        if self.history.contains(fp) {
            tracing::trace!(fingerprint = fp, "duplicate frame dropped");
            return Verdict::Duplicate;
        }

        match Frame::decode(raw) {
            Ok(frame) if terminates_here(frame.command) => Verdict::Deliver {
                frame,
                forward: None,
            },
            Ok(frame) => {
                self.history.insert(fp);
                Verdict::Deliver {
                    frame,
                    forward: Some(from.opposite()),
                }
            }
            Err(e) => {
                self.history.insert(fp);
                Verdict::Malformed(e)
            }
        }
    }

    /// Frame a locally originated message. Flooded frames are recorded
    /// before they leave, so their echo around the ring is recognized as a
    /// duplicate.
    pub fn on_local_send(
        &mut self,
        command: Command,
        sender_id: &str,
        payload: &str,
    ) -> Result<Bytes, FramingError> {
        let raw = wire::encode(command, sender_id, payload)?;
        if !terminates_here(command) {
            self.history.insert(fingerprint(&raw));
        }
        Ok(raw)
    }

    pub fn remembered(&self) -> usize {
        self.history.len()
    }
}
