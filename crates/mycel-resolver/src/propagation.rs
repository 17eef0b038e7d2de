//! Flood-vs-unicast propagation
//!
//! Outbound resolver traffic takes one of two paths: a named destination
//! is unicast through the endpoint with a failure observer attached, and
//! an unnamed one rides the overlay flood. Flooded queries and index
//! messages additionally cover the local neighborhood as a redundant
//! delivery path; responses ride the walk alone.

use std::sync::Arc;

use tracing::{debug, warn};

use mycel_core::overlay::DEFAULT_TTL;
use mycel_core::{Endpoint, EndpointAddress, Envelope, Overlay, PeerIdentity};

use crate::codec;
use crate::error::ResolverError;
use crate::failure::FailureTracker;
use crate::message::{ChannelSet, QueryMessage, ResponseMessage, SrdiMessage};
use crate::routes::RouteAnnotator;

/// Radius of the redundant local-neighbor delivery path
const NEIGHBOR_TTL: u32 = 2;

/// Forwarding count past which a re-flooded query is logged as anomalous
const FORWARD_HOP_LIMIT: u32 = 3;

/// Decides how outbound resolver messages reach the network
pub struct PropagationController<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I>,
    O: Overlay<I>,
{
    service_name: String,
    channels: ChannelSet,
    endpoint: Arc<E>,
    overlay: Arc<O>,
    routes: Arc<RouteAnnotator<I>>,
    failures: FailureTracker<I>,
}

impl<I, E, O> PropagationController<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I>,
    O: Overlay<I>,
{
    pub(crate) fn new(
        service_name: String,
        channels: ChannelSet,
        endpoint: Arc<E>,
        overlay: Arc<O>,
        routes: Arc<RouteAnnotator<I>>,
        failures: FailureTracker<I>,
    ) -> Self {
        Self {
            service_name,
            channels,
            endpoint,
            overlay,
            routes,
            failures,
        }
    }

    /// Send a query to a named peer, or flood it when none is named
    pub async fn send_query(
        &self,
        destination: Option<&I>,
        mut query: QueryMessage<I>,
    ) -> Result<(), ResolverError> {
        debug!(handler = %query.handler_name, query_id = query.query_id, "Sending query");

        // Attach our own route so a distant handler can answer the issuer
        // without a separate discovery round. Hubs skip this; route info
        // in hub-to-hub queries mostly adds bulk. Only the original
        // source route is of interest, so an already-annotated query is
        // left alone.
        if !self.overlay.is_hub() && query.src_route.is_none() {
            if let Some(route) = self.routes.local_route() {
                debug!(origin = %route.peer, "Attaching local route to query");
                query.src_route = Some(route);
            }
        }

        let envelope = codec::encode(&self.channels.query, &query, false)?;

        match destination {
            None => self.flood(envelope, &self.channels.query).await,
            Some(peer) => self.unicast(peer, &self.channels.query, envelope).await,
        }
    }

    /// Re-flood a query nobody here could answer
    ///
    /// Only a hub re-floods; edge nodes rely on their hub to forward
    /// unmatched queries. The envelope is the one the query arrived in,
    /// with its query element rebuilt.
    pub async fn repropagate_query(
        &self,
        mut envelope: Envelope,
        query: &QueryMessage<I>,
    ) -> Result<(), ResolverError> {
        if !self.overlay.is_hub() {
            return Ok(());
        }

        // Forward-count anomaly check, independent of the overlay TTL.
        if query.hop_count > FORWARD_HOP_LIMIT {
            debug!(
                query_id = query.query_id,
                hop_count = query.hop_count,
                "Forward count exceeded for re-flooded query"
            );
        }

        envelope.replace_element(codec::encode_element(&self.channels.query, query, false)?);

        // Loop and TTL control belong to the overlay; the TTL passed here
        // is a default it reduces in flight.
        self.flood(envelope, &self.channels.query).await
    }

    /// Send a response to a named peer, or flood it when none is named
    pub async fn send_response(
        &self,
        destination: Option<&I>,
        response: ResponseMessage<I>,
    ) -> Result<(), ResolverError> {
        match destination {
            None => {
                let envelope = codec::encode(&self.channels.response, &response, false)?;
                self.overlay
                    .walk(
                        envelope,
                        &self.service_name,
                        &self.channels.response,
                        DEFAULT_TTL,
                    )
                    .await?;
                Ok(())
            }
            Some(peer) => {
                // A response may carry the issuer's route; hand it to the
                // transport before sending so the unicast can use it.
                match &response.src_route {
                    Some(route) => {
                        if self.routes.add_route(route.clone()) {
                            debug!(issuer = %route.peer, "Added route to response issuer");
                        } else {
                            warn!(issuer = %route.peer, "Failed to add route from response");
                        }
                    }
                    None => debug!("No route info available to send a response"),
                }

                let envelope = codec::encode(&self.channels.response, &response, false)?;
                self.unicast(peer, &self.channels.response, envelope).await
            }
        }
    }

    /// Send an index message to a named peer, or flood it when none is named
    pub async fn send_srdi(
        &self,
        destination: Option<&I>,
        srdi: SrdiMessage,
    ) -> Result<(), ResolverError> {
        let envelope = codec::encode(&self.channels.srdi, &srdi, srdi.compress)?;

        match destination {
            None => self.flood(envelope, &self.channels.srdi).await,
            Some(peer) => self.unicast(peer, &self.channels.srdi, envelope).await,
        }
    }

    /// Emit on the bounded walk plus the local-neighbor redundant path
    async fn flood(&self, envelope: Envelope, channel: &str) -> Result<(), ResolverError> {
        self.overlay
            .walk(envelope.clone(), &self.service_name, channel, DEFAULT_TTL)
            .await?;
        self.overlay
            .propagate_to_neighbors(envelope, &self.service_name, channel, NEIGHBOR_TTL)
            .await?;
        Ok(())
    }

    /// Unicast with a failure observer bound to the destination
    async fn unicast(
        &self,
        peer: &I,
        channel: &str,
        envelope: Envelope,
    ) -> Result<(), ResolverError> {
        let address = EndpointAddress::new(peer.clone(), &self.service_name, channel);

        let sender = self
            .endpoint
            .resolve_sender(&address)
            .ok_or_else(|| ResolverError::UnresolvedDestination(peer.short_id()))?;

        debug!(%address, "Unicasting envelope");

        let observer = self.failures.observer_for(peer.clone());
        sender.send(envelope, observer).await?;
        Ok(())
    }
}
