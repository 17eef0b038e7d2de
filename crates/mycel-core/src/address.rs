//! Endpoint addressing
//!
//! An [`EndpointAddress`] names a peer plus the service and channel the
//! message is bound for. The transport resolves it to an actual sender.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;

/// Address of a service channel on a specific peer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointAddress<I> {
    /// The destination peer
    pub peer: I,
    /// Service name on the destination
    pub service: String,
    /// Channel parameter on the destination service
    pub channel: String,
}

impl<I: PeerIdentity> EndpointAddress<I> {
    /// Build an address from a peer id and a service/channel pair
    pub fn new(peer: I, service: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            peer,
            service: service.into(),
            channel: channel.into(),
        }
    }
}

impl<I: PeerIdentity> Display for EndpointAddress<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mycel://{}/{}/{}", self.peer, self.service, self.channel)
    }
}
