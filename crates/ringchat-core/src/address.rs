//! Peer addresses and ring ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::wire::ProtocolError;

/// Ids are reduced into this range so they stay short on the wire.
pub const ID_MODULUS: u64 = 1_000_000_000;

/// A dialable endpoint: the address a peer advertises to the ring.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ProtocolError::InvalidAddress(s.to_owned()))?;
        let port = port
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(s.to_owned()))?;
        if host.is_empty() {
            return Err(ProtocolError::InvalidAddress(s.to_owned()));
        }
        Ok(Self::new(host, port))
    }
}

/// Numeric identity of a ring member, carried as decimal text in the
/// sender_id field of every frame it originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RingId(u32);

impl RingId {
    /// Deterministic id for an advertised address.
    ///
    /// Every peer computes the same id for the same address, which lets
    /// whichever peer finishes a splice hand the joiner its id.
    pub fn for_address(addr: &PeerAddress) -> Self {
        let digest = blake3::hash(addr.to_string().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        Self((u64::from_le_bytes(prefix) % ID_MODULUS) as u32)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RingId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s
            .trim()
            .parse()
            .map_err(|_| ProtocolError::InvalidId(s.to_owned()))?;
        if value >= ID_MODULUS {
            return Err(ProtocolError::InvalidId(s.to_owned()));
        }
        Ok(Self(value as u32))
    }
}
