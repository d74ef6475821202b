//! NEW_CONNECTION control payloads.
//!
//! The payload is a short sub-tag followed by a `host:port`:
//!
//!   "1"  new member: the address of a peer asking to be spliced in
//!   "0"  splice completion: the address the joiner must dial next
//!   "2l" repoint left: the receiver's new left neighbor
//!   "2r" repoint right: the receiver's new right neighbor
//!
//! The same payloads double as link greetings: the first frame on a dialed
//! link names the dialer and why it connected.

use std::fmt;

use crate::address::PeerAddress;
use crate::wire::ProtocolError;

const NEW_MEMBER: &str = "1";
const SPLICE_COMPLETE: &str = "0";
const REPOINT_LEFT: &str = "2l";
const REPOINT_RIGHT: &str = "2r";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    NewMember(PeerAddress),
    SpliceComplete(PeerAddress),
    RepointLeft(PeerAddress),
    RepointRight(PeerAddress),
}

impl ControlMessage {
    pub fn address(&self) -> &PeerAddress {
        match self {
            ControlMessage::NewMember(a)
            | ControlMessage::SpliceComplete(a)
            | ControlMessage::RepointLeft(a)
            | ControlMessage::RepointRight(a) => a,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            ControlMessage::NewMember(_) => NEW_MEMBER,
            ControlMessage::SpliceComplete(_) => SPLICE_COMPLETE,
            ControlMessage::RepointLeft(_) => REPOINT_LEFT,
            ControlMessage::RepointRight(_) => REPOINT_RIGHT,
        }
    }

    pub fn parse(payload: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedControl(payload.to_owned());
        // Two-character tags first: "2l"/"2r" share a prefix with nothing else.
        if let Some(rest) = payload.strip_prefix(REPOINT_LEFT) {
            return Ok(ControlMessage::RepointLeft(rest.parse()?));
        }
        if let Some(rest) = payload.strip_prefix(REPOINT_RIGHT) {
            return Ok(ControlMessage::RepointRight(rest.parse()?));
        }
        if let Some(rest) = payload.strip_prefix(NEW_MEMBER) {
            return Ok(ControlMessage::NewMember(rest.parse()?));
        }
        if let Some(rest) = payload.strip_prefix(SPLICE_COMPLETE) {
            return Ok(ControlMessage::SpliceComplete(rest.parse()?));
        }
        Err(malformed())
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tag(), self.address())
    }
}
