//! Overlay flood substrate abstraction
//!
//! The [`Overlay`] is the bounded-flood routing layer the resolver emits
//! into when no destination is named: `walk` carries a message across the
//! hub mesh, `propagate_to_neighbors` covers the local neighborhood as a
//! redundant path. Its internal topology maintenance is not modeled here.

use std::sync::Arc;

use async_trait::async_trait;

use crate::envelope::Envelope;
use crate::error::OverlayError;
use crate::identity::PeerIdentity;
use crate::transport::ChannelListener;

/// Default TTL for overlay walks
///
/// A default only; the overlay reduces it appropriately as the message
/// travels.
pub const DEFAULT_TTL: u32 = 200;

/// The overlay flood substrate as seen by the resolver
#[async_trait]
pub trait Overlay<I: PeerIdentity>: Send + Sync {
    /// Emit an envelope on the bounded overlay walk
    async fn walk(
        &self,
        envelope: Envelope,
        service: &str,
        channel: &str,
        ttl: u32,
    ) -> Result<(), OverlayError>;

    /// Propagate an envelope to directly-reachable neighbors
    async fn propagate_to_neighbors(
        &self,
        envelope: Envelope,
        service: &str,
        channel: &str,
        ttl: u32,
    ) -> Result<(), OverlayError>;

    /// Register a listener for propagated envelopes
    ///
    /// Returns false if a listener is already registered under `name`.
    fn add_propagate_listener(&self, name: &str, listener: Arc<dyn ChannelListener<I>>) -> bool;

    /// Remove a propagate listener
    ///
    /// Returns false if none was registered under `name`.
    fn remove_propagate_listener(&self, name: &str) -> bool;

    /// Whether this node is an overlay hub
    ///
    /// Hubs relay queries and index updates on behalf of edge nodes that
    /// only connect to them.
    fn is_hub(&self) -> bool;
}
