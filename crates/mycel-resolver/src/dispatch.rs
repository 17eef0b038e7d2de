//! Per-channel inbound dispatch
//!
//! Each logical channel gets its own listener variant: decode the
//! envelope, resolve the named handler, invoke it inside the isolation
//! boundary, and decide whether the query should be re-flooded. Messages
//! are processed independently; there is no cross-message state.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use mycel_core::{ChannelListener, Endpoint, EndpointAddress, Envelope, Overlay, PeerIdentity};

use crate::codec;
use crate::handler::{QueryHandler, QueryOutcome, SrdiHandler};
use crate::message::{ChannelSet, QueryMessage, ResponseMessage, SrdiMessage};
use crate::propagation::PropagationController;
use crate::registry::HandlerTable;

/// Hop-count ceiling for processing an inbound query
const HOP_LIMIT: u32 = 2;

/// Shared state behind the three channel listeners
pub(crate) struct DispatchEngine<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    pub(crate) channels: ChannelSet,
    pub(crate) query_handlers: Arc<HandlerTable<dyn QueryHandler<I>>>,
    pub(crate) srdi_handlers: Arc<HandlerTable<dyn SrdiHandler<I>>>,
    pub(crate) propagation: Arc<PropagationController<I, E, O>>,
    pub(crate) overlay: Arc<O>,
}

impl<I, E, O> DispatchEngine<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    pub(crate) fn new(
        channels: ChannelSet,
        query_handlers: Arc<HandlerTable<dyn QueryHandler<I>>>,
        srdi_handlers: Arc<HandlerTable<dyn SrdiHandler<I>>>,
        propagation: Arc<PropagationController<I, E, O>>,
        overlay: Arc<O>,
    ) -> Self {
        Self {
            channels,
            query_handlers,
            srdi_handlers,
            propagation,
            overlay,
        }
    }

    /// Process one inbound query, deciding its outcome
    pub(crate) async fn process_query(
        &self,
        query: QueryMessage<I>,
        source: &EndpointAddress<I>,
    ) -> QueryOutcome {
        if query.hop_count > HOP_LIMIT {
            debug!(
                query_id = query.query_id,
                hop_count = query.hop_count,
                "Discarding query, forwarded too many times"
            );
            return QueryOutcome::Ok;
        }

        let Some(handler) = self.query_handlers.get(&query.handler_name) else {
            debug!(
                query_id = query.query_id,
                handler = %query.handler_name,
                "No handler for query"
            );
            // A hub re-floods so another hub carrying the handler can
            // answer instead.
            return QueryOutcome::Repropagate;
        };

        debug!(query_id = query.query_id, handler = %query.handler_name, "Handing query to handler");

        let name = query.handler_name.clone();
        match AssertUnwindSafe(handler.process_query(query, source))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => {
                warn!(handler = %name, %error, "Query handler failed; suppressing repropagation");
                QueryOutcome::Ok
            }
            Err(_) => {
                warn!(handler = %name, "Query handler panicked; suppressing repropagation");
                QueryOutcome::Ok
            }
        }
    }

    /// Process one inbound response
    pub(crate) async fn process_response(
        &self,
        response: ResponseMessage<I>,
        source: &EndpointAddress<I>,
    ) {
        if response.handler_name.is_empty() {
            warn!(%source, "Missing handler name in response");
            return;
        }

        let Some(handler) = self.query_handlers.get(&response.handler_name) else {
            warn!(handler = %response.handler_name, "No handler for response");
            return;
        };

        debug!(
            query_id = response.query_id,
            handler = %response.handler_name,
            "Processing response"
        );

        let name = response.handler_name.clone();
        match AssertUnwindSafe(handler.process_response(response, source))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(handler = %name, %error, "Response handler failed"),
            Err(_) => warn!(handler = %name, "Response handler panicked"),
        }
    }

    /// Process one inbound index message
    pub(crate) async fn process_srdi(&self, message: SrdiMessage) {
        if message.handler_name.is_empty() {
            warn!("Missing handler name in index message");
            return;
        }

        let Some(handler) = self.srdi_handlers.get(&message.handler_name) else {
            // A hub without the handler is expected transiently while
            // services come up; an edge node without it is noteworthy.
            if self.overlay.is_hub() {
                debug!(handler = %message.handler_name, "No index handler registered");
            } else {
                warn!(handler = %message.handler_name, "No index handler registered");
            }
            return;
        };

        let name = message.handler_name.clone();
        match AssertUnwindSafe(handler.process_srdi(message))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(handler = %name, %error, "Index handler failed"),
            Err(_) => warn!(handler = %name, "Index handler panicked"),
        }
    }
}

/// Listener for the outbound-query channel
pub(crate) struct QueryDemux<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    engine: Arc<DispatchEngine<I, E, O>>,
}

impl<I, E, O> QueryDemux<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    pub(crate) fn new(engine: Arc<DispatchEngine<I, E, O>>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl<I, E, O> ChannelListener<I> for QueryDemux<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    async fn on_message(
        &self,
        envelope: Envelope,
        source: EndpointAddress<I>,
        _destination: EndpointAddress<I>,
    ) {
        debug!(%source, "Demuxing a query envelope");

        let query: QueryMessage<I> = match codec::decode(&envelope, &self.engine.channels.query) {
            Ok(query) => query,
            Err(error) => {
                warn!(%source, %error, "Dropping malformed query envelope");
                return;
            }
        };

        let outcome = self.engine.process_query(query.clone(), &source).await;

        if outcome == QueryOutcome::Repropagate {
            debug!(query_id = query.query_id, %source, "Repropagating unmatched query");
            if let Err(error) = self.engine.propagation.repropagate_query(envelope, &query).await
            {
                warn!(%error, "Failed to repropagate query");
            }
        }
    }
}

/// Listener for the inbound-response channel
pub(crate) struct ResponseDemux<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    engine: Arc<DispatchEngine<I, E, O>>,
}

impl<I, E, O> ResponseDemux<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    pub(crate) fn new(engine: Arc<DispatchEngine<I, E, O>>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl<I, E, O> ChannelListener<I> for ResponseDemux<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    async fn on_message(
        &self,
        envelope: Envelope,
        source: EndpointAddress<I>,
        _destination: EndpointAddress<I>,
    ) {
        debug!(%source, "Demuxing a response envelope");

        let response: ResponseMessage<I> =
            match codec::decode(&envelope, &self.engine.channels.response) {
                Ok(response) => response,
                Err(error) => {
                    warn!(%source, %error, "Dropping malformed response envelope");
                    return;
                }
            };

        self.engine.process_response(response, &source).await;
    }
}

/// Listener for the index channel
pub(crate) struct SrdiDemux<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    engine: Arc<DispatchEngine<I, E, O>>,
}

impl<I, E, O> SrdiDemux<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    pub(crate) fn new(engine: Arc<DispatchEngine<I, E, O>>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl<I, E, O> ChannelListener<I> for SrdiDemux<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    async fn on_message(
        &self,
        envelope: Envelope,
        source: EndpointAddress<I>,
        _destination: EndpointAddress<I>,
    ) {
        debug!(%source, "Demuxing an index envelope");

        let message: SrdiMessage = match codec::decode(&envelope, &self.engine.channels.srdi) {
            Ok(message) => message,
            Err(error) => {
                warn!(%source, %error, "Dropping malformed index envelope");
                return;
            }
        };

        self.engine.process_srdi(message).await;
    }
}
