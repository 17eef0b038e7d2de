//! Peer identity abstractions
//!
//! [`PeerIdentity`] abstracts over how peers are named, so the resolver
//! engine works unchanged with lightweight simulation identities and with
//! whatever identity type the host's transport uses.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::IdentityError;

/// Trait for peer identity abstraction
///
/// Identities travel inside route advertisements and failure events, so
/// they must serialize, and they key concurrent tables, so they must hash.
pub trait PeerIdentity:
    Clone + Eq + Hash + Send + Sync + Debug + Display + Serialize + DeserializeOwned + 'static
{
    /// Get the identity as bytes
    fn as_bytes(&self) -> Vec<u8>;

    /// Create an identity from bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError>;

    /// Get a short display form (for logging)
    fn short_id(&self) -> String {
        format!("{}", self)
    }
}

/// Label-based identity for simulation and testing
///
/// A peer is named by a non-empty ASCII label such as `"alpha"` or `"P1"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimPeerId(String);

impl SimPeerId {
    /// Create a new simulation identity from a non-empty ASCII label
    pub fn new(label: impl Into<String>) -> Option<Self> {
        let label = label.into();
        if !label.is_empty() && label.is_ascii() {
            Some(Self(label))
        } else {
            None
        }
    }

    /// Get the underlying label
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SimPeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PeerIdentity for SimPeerId {
    fn as_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let label = std::str::from_utf8(bytes)
            .map_err(|e| IdentityError::InvalidFormat(e.to_string()))?;
        Self::new(label)
            .ok_or_else(|| IdentityError::InvalidFormat(format!("invalid label: {:?}", label)))
    }

    fn short_id(&self) -> String {
        self.0.clone()
    }
}
