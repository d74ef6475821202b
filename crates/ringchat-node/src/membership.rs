//! Ring membership state and the decisions that drive splices and repoints.
//!
//! Everything here is pure: the node actor asks what to do and then does the
//! I/O itself. That keeps the state machine testable without sockets.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use ringchat_core::wire::ProtocolError;
use ringchat_core::{ControlMessage, PeerAddress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipState {
    /// Alone: both neighbor slots point back at this node.
    Solo,
    /// Waiting on the entry point for an id and a next hop.
    Joining,
    /// Member of a ring with two neighbors.
    Joined,
    /// Acting as the right side of a splice; `candidate` is expected to
    /// dial in and become the new left neighbor.
    Inserting { candidate: PeerAddress },
}

impl fmt::Display for MembershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipState::Solo => write!(f, "solo"),
            MembershipState::Joining => write!(f, "joining"),
            MembershipState::Joined => write!(f, "joined"),
            MembershipState::Inserting { candidate } => write!(f, "inserting {candidate}"),
        }
    }
}

impl MembershipState {
    fn invalid(&self, event: &'static str) -> ProtocolError {
        ProtocolError::InvalidForState {
            event,
            state: self.to_string(),
        }
    }
}

// ── Awaited joins ─────────────────────────────────────────────────────────────

/// Addresses expected to dial in and take the left slot.
#[derive(Debug, Default)]
pub struct AwaitedJoins {
    expected: HashSet<PeerAddress>,
}

impl AwaitedJoins {
    pub fn insert(&mut self, addr: PeerAddress) {
        self.expected.insert(addr);
    }

    /// Returns whether `addr` was awaited.
    pub fn remove(&mut self, addr: &PeerAddress) -> bool {
        self.expected.remove(addr)
    }

    pub fn contains(&self, addr: &PeerAddress) -> bool {
        self.expected.contains(addr)
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    /// Sorted copy, for status output.
    pub fn to_vec(&self) -> Vec<PeerAddress> {
        let mut out: Vec<_> = self.expected.iter().cloned().collect();
        out.sort();
        out
    }
}

// ── Greetings ─────────────────────────────────────────────────────────────────

/// What to do with a freshly greeted inbound link.
#[derive(Debug, PartialEq, Eq)]
pub enum GreetingAction {
    /// We are alone: hand out the id and splice the caller in ourselves.
    SpliceDirect(PeerAddress),
    /// Park the caller and ask our right neighbor to make room.
    RelayNewMember(PeerAddress),
    /// The awaited joiner completed its splice; it becomes our left neighbor.
    CompleteSplice(PeerAddress),
    /// A disconnect survivor attaches as our left neighbor.
    AttachLeft(PeerAddress),
    Reject(ProtocolError),
}

/// Decide how to treat an inbound link from its greeting.
///
/// Only one splice runs at a time: while a candidate is parked here, or
/// while this node is itself the right side of a splice, new members are
/// turned away.
pub fn classify_greeting(
    state: &MembershipState,
    awaited: &AwaitedJoins,
    splice_pending: bool,
    intent: &ControlMessage,
) -> GreetingAction {
    match intent {
        ControlMessage::NewMember(addr) => {
            if splice_pending {
                return GreetingAction::Reject(state.invalid("new member while a splice is pending"));
            }
            match state {
                MembershipState::Solo => GreetingAction::SpliceDirect(addr.clone()),
                MembershipState::Joined => GreetingAction::RelayNewMember(addr.clone()),
                MembershipState::Joining | MembershipState::Inserting { .. } => {
                    GreetingAction::Reject(state.invalid("new member"))
                }
            }
        }
        ControlMessage::SpliceComplete(addr) => {
            if awaited.contains(addr) {
                GreetingAction::CompleteSplice(addr.clone())
            } else {
                GreetingAction::Reject(ProtocolError::UnexpectedGreeting(addr.to_string()))
            }
        }
        ControlMessage::RepointLeft(addr) => GreetingAction::AttachLeft(addr.clone()),
        ControlMessage::RepointRight(addr) => {
            GreetingAction::Reject(ProtocolError::UnexpectedGreeting(addr.to_string()))
        }
    }
}

/// A relayed new-member request may only start a splice on a settled member.
pub fn admit_relayed_member(state: &MembershipState) -> Result<(), ProtocolError> {
    match state {
        MembershipState::Joined => Ok(()),
        other => Err(other.invalid("new member relay")),
    }
}

// ── Repoints ──────────────────────────────────────────────────────────────────

/// Reaction to a departing neighbor naming our new neighbor.
#[derive(Debug, PartialEq, Eq)]
pub enum Repoint {
    /// The new neighbor is us: that side of the ring is now empty.
    PointAtSelf,
    /// Already linked to the named neighbor.
    Keep,
    /// Wait for the named neighbor to dial in.
    Await(PeerAddress),
    /// Dial the named neighbor.
    Dial(PeerAddress),
}

/// `"2r"`: our right neighbor is leaving; we dial its right neighbor.
pub fn plan_repoint_right(own: &PeerAddress, next: &PeerAddress) -> Repoint {
    if next == own {
        Repoint::PointAtSelf
    } else {
        Repoint::Dial(next.clone())
    }
}

/// `"2l"`: our left neighbor is leaving; its left neighbor will dial us,
/// unless that dial already landed.
pub fn plan_repoint_left(
    own: &PeerAddress,
    current_left: Option<&PeerAddress>,
    next: &PeerAddress,
) -> Repoint {
    if next == own {
        Repoint::PointAtSelf
    } else if current_left == Some(next) {
        Repoint::Keep
    } else {
        Repoint::Await(next.clone())
    }
}
