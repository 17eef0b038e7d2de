//! Mock endpoint and overlay implementations for testing
//!
//! Provides in-memory collaborators so dispatch and propagation logic can
//! be exercised without a real network. Both mocks record every outbound
//! call for assertions and can inject delivery failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::address::EndpointAddress;
use crate::delivery::{DeliveryFailure, FailureCause};
use crate::envelope::Envelope;
use crate::error::{OverlayError, TransportError};
use crate::identity::PeerIdentity;
use crate::overlay::Overlay;
use crate::transport::{
    ChannelListener, DeliveryObserver, Endpoint, MessageSender, RouteAdvertisement, RouteControl,
    RouteStatus,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn listener_key(service: &str, channel: &str) -> String {
    format!("{}/{}", service, channel)
}

/// One unicast send recorded by the mock endpoint
#[derive(Debug, Clone)]
pub struct SentMessage<I: PeerIdentity> {
    /// Where the envelope was addressed
    pub address: EndpointAddress<I>,
    /// The envelope that was sent
    pub envelope: Envelope,
}

struct EndpointState<I: PeerIdentity> {
    sent: Mutex<Vec<SentMessage<I>>>,
    failing: DashMap<I, FailureCause>,
}

/// In-memory endpoint
///
/// Senders always resolve unless the destination was marked unresolvable.
/// A send to a peer marked failing is accepted, then reported to the
/// attached observer as a delivery failure, the way a real transport
/// confirms failures asynchronously.
pub struct MockEndpoint<I: PeerIdentity> {
    local_id: I,
    state: Arc<EndpointState<I>>,
    unresolvable: DashMap<I, ()>,
    listeners: DashMap<String, Arc<dyn ChannelListener<I>>>,
    route_control: Option<Arc<dyn RouteControl<I>>>,
}

impl<I: PeerIdentity> MockEndpoint<I> {
    /// Create a mock endpoint with the given local identity
    pub fn new(local_id: I) -> Self {
        Self {
            local_id,
            state: Arc::new(EndpointState {
                sent: Mutex::new(Vec::new()),
                failing: DashMap::new(),
            }),
            unresolvable: DashMap::new(),
            listeners: DashMap::new(),
            route_control: None,
        }
    }

    /// Create a mock endpoint that exposes a route-control capability
    pub fn with_route_control(local_id: I, control: Arc<dyn RouteControl<I>>) -> Self {
        let mut endpoint = Self::new(local_id);
        endpoint.route_control = Some(control);
        endpoint
    }

    /// Our local identity
    pub fn local_id(&self) -> &I {
        &self.local_id
    }

    /// All unicast sends recorded so far
    pub fn sent(&self) -> Vec<SentMessage<I>> {
        lock(&self.state.sent).clone()
    }

    /// Report every future send to `peer` as failed with `cause`
    pub fn fail_sends_to(&self, peer: I, cause: FailureCause) {
        self.state.failing.insert(peer, cause);
    }

    /// Make `resolve_sender` return `None` for `peer`
    pub fn make_unresolvable(&self, peer: I) {
        self.unresolvable.insert(peer, ());
    }

    /// Whether a listener is registered for the service/channel pair
    pub fn has_listener(&self, service: &str, channel: &str) -> bool {
        self.listeners.contains_key(&listener_key(service, channel))
    }

    /// Hand an inbound envelope to the listener registered for the
    /// service/channel pair, as if the transport had delivered it
    pub async fn deliver(&self, service: &str, channel: &str, envelope: Envelope, from: I) {
        let listener = self
            .listeners
            .get(&listener_key(service, channel))
            .map(|entry| Arc::clone(entry.value()));

        if let Some(listener) = listener {
            let source = EndpointAddress::new(from, service, channel);
            let destination = EndpointAddress::new(self.local_id.clone(), service, channel);
            listener.on_message(envelope, source, destination).await;
        }
    }
}

struct MockSender<I: PeerIdentity> {
    address: EndpointAddress<I>,
    state: Arc<EndpointState<I>>,
}

#[async_trait]
impl<I: PeerIdentity> MessageSender<I> for MockSender<I> {
    async fn send(
        &self,
        envelope: Envelope,
        observer: Arc<dyn DeliveryObserver<I>>,
    ) -> Result<(), TransportError> {
        lock(&self.state.sent).push(SentMessage {
            address: self.address.clone(),
            envelope,
        });

        let failure = self
            .state
            .failing
            .get(&self.address.peer)
            .map(|entry| entry.value().clone());

        match failure {
            Some(cause) => {
                observer
                    .delivery_failed(DeliveryFailure::new(self.address.peer.clone(), cause))
                    .await;
            }
            None => observer.delivery_succeeded(&self.address.peer).await,
        }

        Ok(())
    }
}

#[async_trait]
impl<I: PeerIdentity> Endpoint<I> for MockEndpoint<I> {
    fn resolve_sender(
        &self,
        address: &EndpointAddress<I>,
    ) -> Option<Arc<dyn MessageSender<I>>> {
        if self.unresolvable.contains_key(&address.peer) {
            return None;
        }
        Some(Arc::new(MockSender {
            address: address.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    fn add_listener(
        &self,
        service: &str,
        channel: &str,
        listener: Arc<dyn ChannelListener<I>>,
    ) -> bool {
        match self.listeners.entry(listener_key(service, channel)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(listener);
                true
            }
        }
    }

    fn remove_listener(&self, service: &str, channel: &str) -> bool {
        self.listeners
            .remove(&listener_key(service, channel))
            .is_some()
    }

    fn route_control(&self) -> Option<Arc<dyn RouteControl<I>>> {
        self.route_control.clone()
    }
}

/// One flood emission recorded by the mock overlay
#[derive(Debug, Clone)]
pub struct PropagateCall {
    /// The envelope that was emitted
    pub envelope: Envelope,
    /// Service name the emission was addressed to
    pub service: String,
    /// Channel the emission was addressed to
    pub channel: String,
    /// TTL the caller requested
    pub ttl: u32,
}

/// In-memory overlay recording walks and neighbor propagates
pub struct MockOverlay<I: PeerIdentity> {
    hub: AtomicBool,
    walks: Mutex<Vec<PropagateCall>>,
    neighbor_casts: Mutex<Vec<PropagateCall>>,
    listeners: DashMap<String, Arc<dyn ChannelListener<I>>>,
}

impl<I: PeerIdentity> MockOverlay<I> {
    /// Create a mock overlay; the node starts as a non-hub
    pub fn new() -> Self {
        Self {
            hub: AtomicBool::new(false),
            walks: Mutex::new(Vec::new()),
            neighbor_casts: Mutex::new(Vec::new()),
            listeners: DashMap::new(),
        }
    }

    /// Mark this node as a hub (or not)
    pub fn set_hub(&self, hub: bool) {
        self.hub.store(hub, Ordering::SeqCst);
    }

    /// All walk emissions recorded so far
    pub fn walks(&self) -> Vec<PropagateCall> {
        lock(&self.walks).clone()
    }

    /// All neighbor-propagate emissions recorded so far
    pub fn neighbor_casts(&self) -> Vec<PropagateCall> {
        lock(&self.neighbor_casts).clone()
    }

    /// Whether a propagate listener is registered under `name`
    pub fn has_propagate_listener(&self, name: &str) -> bool {
        self.listeners.contains_key(name)
    }

    /// Hand a propagated envelope to the listener registered under `name`
    pub async fn deliver_propagated(
        &self,
        name: &str,
        envelope: Envelope,
        source: EndpointAddress<I>,
        destination: EndpointAddress<I>,
    ) {
        let listener = self
            .listeners
            .get(name)
            .map(|entry| Arc::clone(entry.value()));

        if let Some(listener) = listener {
            listener.on_message(envelope, source, destination).await;
        }
    }
}

impl<I: PeerIdentity> Default for MockOverlay<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I: PeerIdentity> Overlay<I> for MockOverlay<I> {
    async fn walk(
        &self,
        envelope: Envelope,
        service: &str,
        channel: &str,
        ttl: u32,
    ) -> Result<(), OverlayError> {
        lock(&self.walks).push(PropagateCall {
            envelope,
            service: service.to_string(),
            channel: channel.to_string(),
            ttl,
        });
        Ok(())
    }

    async fn propagate_to_neighbors(
        &self,
        envelope: Envelope,
        service: &str,
        channel: &str,
        ttl: u32,
    ) -> Result<(), OverlayError> {
        lock(&self.neighbor_casts).push(PropagateCall {
            envelope,
            service: service.to_string(),
            channel: channel.to_string(),
            ttl,
        });
        Ok(())
    }

    fn add_propagate_listener(&self, name: &str, listener: Arc<dyn ChannelListener<I>>) -> bool {
        match self.listeners.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(listener);
                true
            }
        }
    }

    fn remove_propagate_listener(&self, name: &str) -> bool {
        self.listeners.remove(name).is_some()
    }

    fn is_hub(&self) -> bool {
        self.hub.load(Ordering::SeqCst)
    }
}

/// In-memory route-control capability
pub struct MockRouteControl<I: PeerIdentity> {
    local: Mutex<Option<RouteAdvertisement<I>>>,
    added: Mutex<Vec<RouteAdvertisement<I>>>,
    reject: AtomicBool,
}

impl<I: PeerIdentity> MockRouteControl<I> {
    /// Create a route control with no local route yet
    pub fn new() -> Self {
        Self {
            local: Mutex::new(None),
            added: Mutex::new(Vec::new()),
            reject: AtomicBool::new(false),
        }
    }

    /// Set the local route handed out by `local_route`
    pub fn set_local_route(&self, route: RouteAdvertisement<I>) {
        *lock(&self.local) = Some(route);
    }

    /// Make `add_route` report failure
    pub fn reject_routes(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Routes accepted so far
    pub fn added_routes(&self) -> Vec<RouteAdvertisement<I>> {
        lock(&self.added).clone()
    }
}

impl<I: PeerIdentity> Default for MockRouteControl<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: PeerIdentity> RouteControl<I> for MockRouteControl<I> {
    fn local_route(&self) -> Option<RouteAdvertisement<I>> {
        lock(&self.local).clone()
    }

    fn add_route(&self, route: RouteAdvertisement<I>) -> RouteStatus {
        if self.reject.load(Ordering::SeqCst) {
            return RouteStatus::Failed;
        }
        lock(&self.added).push(route);
        RouteStatus::Added
    }
}
