//! Transport abstraction: unicast endpoint, listeners, and route control
//!
//! The [`Endpoint`] trait is the resolver's view of the host transport:
//! it resolves addresses to senders, accepts per-channel inbound listeners,
//! and optionally exposes a [`RouteControl`] capability for route exchange.
//!
//! ## Implementations
//!
//! - [`MockEndpoint`](crate::mock::MockEndpoint): In-memory endpoint for testing
//! - Real transports are supplied by the host platform

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::EndpointAddress;
use crate::delivery::DeliveryFailure;
use crate::envelope::Envelope;
use crate::error::TransportError;
use crate::identity::PeerIdentity;

/// Opaque reachability descriptor for a peer
///
/// Exchanged opportunistically so a responder can reach the query issuer
/// without separate route discovery. Holders hand out owned copies only;
/// the transport's own local route object is mutable and reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAdvertisement<I> {
    /// The peer this route reaches
    pub peer: I,
    /// Transport addresses, in preference order
    pub endpoints: Vec<String>,
}

impl<I: PeerIdentity> RouteAdvertisement<I> {
    /// Create a route advertisement with no endpoint addresses
    pub fn new(peer: I) -> Self {
        Self {
            peer,
            endpoints: Vec::new(),
        }
    }

    /// Create a route advertisement with endpoint addresses
    pub fn with_endpoints(peer: I, endpoints: Vec<String>) -> Self {
        Self { peer, endpoints }
    }
}

/// Result of handing a route to the route-control capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStatus {
    /// The route was accepted
    Added,
    /// The route was rejected or could not be stored
    Failed,
}

/// Optional transport capability for route manipulation
///
/// Both operations are atomic; callers never hold a lock across the
/// network send that follows.
pub trait RouteControl<I: PeerIdentity>: Send + Sync {
    /// This node's own route, as an owned copy, if one is known yet
    fn local_route(&self) -> Option<RouteAdvertisement<I>>;

    /// Add a route learned from a received message
    fn add_route(&self, route: RouteAdvertisement<I>) -> RouteStatus;
}

/// Observer attached to a unicast send, bound to its destination
#[async_trait]
pub trait DeliveryObserver<I: PeerIdentity>: Send + Sync {
    /// The transport confirmed the send failed
    async fn delivery_failed(&self, failure: DeliveryFailure<I>);

    /// The transport confirmed the send succeeded
    async fn delivery_succeeded(&self, _peer: &I) {}
}

/// Callback for inbound envelopes on one logical channel
#[async_trait]
pub trait ChannelListener<I: PeerIdentity>: Send + Sync {
    /// Process one inbound envelope
    ///
    /// `source` is whoever handed us the envelope; it may not be the
    /// message originator.
    async fn on_message(
        &self,
        envelope: Envelope,
        source: EndpointAddress<I>,
        destination: EndpointAddress<I>,
    );
}

/// A resolved sender for one destination address
#[async_trait]
pub trait MessageSender<I: PeerIdentity>: Send + Sync {
    /// Send an envelope, reporting the outcome to the observer
    ///
    /// Delivery is best-effort and at-most-once; `Ok` means the send was
    /// accepted, not that it arrived.
    async fn send(
        &self,
        envelope: Envelope,
        observer: Arc<dyn DeliveryObserver<I>>,
    ) -> Result<(), TransportError>;
}

/// The host transport as seen by the resolver
#[async_trait]
pub trait Endpoint<I: PeerIdentity>: Send + Sync {
    /// Resolve an address to a sender, or `None` if the destination
    /// cannot currently be resolved
    fn resolve_sender(&self, address: &EndpointAddress<I>)
        -> Option<Arc<dyn MessageSender<I>>>;

    /// Resolve and send in one step
    async fn send(
        &self,
        address: &EndpointAddress<I>,
        envelope: Envelope,
        observer: Arc<dyn DeliveryObserver<I>>,
    ) -> Result<(), TransportError> {
        match self.resolve_sender(address) {
            Some(sender) => sender.send(envelope, observer).await,
            None => Err(TransportError::AddressResolutionFailed(address.to_string())),
        }
    }

    /// Register an inbound listener for a service/channel pair
    ///
    /// Returns false if a listener is already registered there.
    fn add_listener(
        &self,
        service: &str,
        channel: &str,
        listener: Arc<dyn ChannelListener<I>>,
    ) -> bool;

    /// Remove the listener for a service/channel pair
    ///
    /// Returns false if none was registered.
    fn remove_listener(&self, service: &str, channel: &str) -> bool;

    /// The transport's route-control capability, when it has one
    fn route_control(&self) -> Option<Arc<dyn RouteControl<I>>> {
        None
    }
}
