//! Network peer identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{PublicKey, TypesError};

/// Whether a peer takes part in consensus or only consumes blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerRole {
    #[default]
    Validator,
    Client,
}

/// Identity record of a remote node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub ip: String,
    pub port: u16,
    /// Transport-level peer identifier (may be empty for direct TCP peers).
    pub peer_id: String,
    /// Validator index inside the shard; 0 means unassigned (or a client).
    pub validator_id: u32,
    /// Absent until the peer's handshake has delivered it.
    pub public_key: Option<PublicKey>,
    pub role: PeerRole,
}

impl Peer {
    /// A validator peer with no key and no validator index yet.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            peer_id: String::new(),
            validator_id: 0,
            public_key: None,
            role: PeerRole::Validator,
        }
    }

    pub fn with_peer_id(mut self, peer_id: impl Into<String>) -> Self {
        self.peer_id = peer_id.into();
        self
    }

    pub fn with_public_key(mut self, key: PublicKey) -> Self {
        self.public_key = Some(key);
        self
    }

    pub fn with_role(mut self, role: PeerRole) -> Self {
        self.role = role;
        self
    }

    /// Stable identifier used by the peer table: `ip:port:peer_id`.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.ip, self.port, self.peer_id)
    }

    /// Parse an `ip:port` endpoint into a bare validator peer.
    pub fn from_endpoint(endpoint: &str) -> Result<Self, TypesError> {
        let (ip, port) = endpoint
            .rsplit_once(':')
            .ok_or_else(|| TypesError::InvalidEndpoint(endpoint.to_string()))?;
        if ip.is_empty() {
            return Err(TypesError::InvalidEndpoint(endpoint.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| TypesError::InvalidEndpoint(endpoint.to_string()))?;
        Ok(Self::new(ip, port))
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)?;
        if !self.peer_id.is_empty() {
            write!(f, "/{}", self.peer_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_includes_transport_id() {
        let a = Peer::new("127.0.0.1", 8000).with_peer_id("QmA");
        let b = Peer::new("127.0.0.1", 8000).with_peer_id("QmB");
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), "127.0.0.1:8000:QmA");
    }

    #[test]
    fn endpoint_parsing() {
        let peer = Peer::from_endpoint("10.0.0.7:9000").unwrap();
        assert_eq!(peer.ip, "10.0.0.7");
        assert_eq!(peer.port, 9000);
        assert_eq!(peer.role, PeerRole::Validator);

        assert!(Peer::from_endpoint("10.0.0.7").is_err());
        assert!(Peer::from_endpoint(":9000").is_err());
        assert!(Peer::from_endpoint("10.0.0.7:99999").is_err());
    }
}
