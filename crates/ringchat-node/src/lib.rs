//! ringchat-node: the ring member with its neighbor links, flood relay, command
//! dispatch, membership and the actor that owns them.

pub mod dispatch;
pub mod error;
pub mod link;
pub mod membership;
pub mod node;
pub mod relay;

pub use error::{ApplicationError, ConnectionError};
pub use link::Direction;
pub use membership::MembershipState;
pub use node::{start, ChatEvent, Neighbor, NodeHandle, NodeRuntime, Snapshot};
