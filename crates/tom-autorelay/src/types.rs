use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::AutoRelayError;

/// ToM network identity — Ed25519 public key.
///
/// Displayed and parsed as hex string. The hex form is the canonical key
/// used for relay membership.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(iroh_base::PublicKey);

impl NodeId {
    /// Create from a public key (an iroh `EndpointId`).
    pub fn from_public_key(key: iroh_base::PublicKey) -> Self {
        Self(key)
    }

    /// Access the underlying public key.
    pub fn as_public_key(&self) -> &iroh_base::PublicKey {
        &self.0
    }

    /// Get the raw 32-byte public key.
    pub fn as_bytes(&self) -> [u8; 32] {
        *self.0.as_bytes()
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl From<iroh_base::PublicKey> for NodeId {
    fn from(key: iroh_base::PublicKey) -> Self {
        Self(key)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.0.to_string();
        let short = if hex.len() > 12 { &hex[..12] } else { &hex };
        write!(f, "NodeId({short}...)")
    }
}

impl FromStr for NodeId {
    type Err = AutoRelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: iroh_base::PublicKey = s
            .parse()
            .map_err(|_| AutoRelayError::InvalidNodeId(s.to_string()))?;
        Ok(Self(key))
    }
}

impl serde::Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for NodeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
pub(crate) fn test_node_id(seed: u8) -> NodeId {
    let secret = iroh_base::SecretKey::from_bytes(&[seed; 32]);
    NodeId::from_public_key(secret.public())
}
