//! Resolver service lifecycle and facade
//!
//! A [`ResolverService`] is built per group instance: it derives its
//! channel names once, binds the three channel listeners at start, and
//! fronts handler registration and the send operations. Registries are
//! per-instance, never process-wide.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use mycel_core::{ChannelListener, Endpoint, Overlay, PeerIdentity};

use crate::dispatch::{DispatchEngine, QueryDemux, ResponseDemux, SrdiDemux};
use crate::error::ResolverError;
use crate::failure::FailureTracker;
use crate::handler::{QueryHandler, SrdiHandler};
use crate::message::{ChannelSet, QueryMessage, ResponseMessage, SrdiMessage};
use crate::propagation::PropagationController;
use crate::registry::HandlerTable;
use crate::routes::RouteAnnotator;

/// Static configuration for one resolver instance
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Name listeners register under; also the service component of
    /// outbound unicast addresses
    pub service_name: String,
    /// Group-unique prefix the channel names derive from
    pub group_prefix: String,
}

impl ResolverConfig {
    /// Create a resolver configuration
    pub fn new(service_name: impl Into<String>, group_prefix: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            group_prefix: group_prefix.into(),
        }
    }
}

/// Builder for a [`ResolverService`]
///
/// The endpoint and overlay may not exist yet when the host assembles its
/// services; `build` reports a missing one as a retryable
/// [`ResolverError::DependencyNotReady`] rather than failing permanently.
pub struct ResolverBuilder<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    config: ResolverConfig,
    endpoint: Option<Arc<E>>,
    overlay: Option<Arc<O>>,
    _identity: PhantomData<I>,
}

impl<I, E, O> ResolverBuilder<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    /// Start a builder from a configuration
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            endpoint: None,
            overlay: None,
            _identity: PhantomData,
        }
    }

    /// Supply the transport endpoint
    pub fn endpoint(mut self, endpoint: Arc<E>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Supply the overlay flood substrate
    pub fn overlay(mut self, overlay: Arc<O>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Assemble the service
    ///
    /// The route-control capability is fetched from the endpoint here,
    /// once; it is optional and its absence degrades route annotation to
    /// a no-op.
    pub fn build(self) -> Result<ResolverService<I, E, O>, ResolverError> {
        let endpoint = self
            .endpoint
            .ok_or(ResolverError::DependencyNotReady("transport endpoint"))?;
        let overlay = self
            .overlay
            .ok_or(ResolverError::DependencyNotReady("overlay service"))?;

        let channels = ChannelSet::new(&self.config.group_prefix);

        info!(
            service = %self.config.service_name,
            query_channel = %channels.query,
            response_channel = %channels.response,
            srdi_channel = %channels.srdi,
            "Configuring resolver service"
        );

        let routes = Arc::new(RouteAnnotator::new(endpoint.route_control()));
        let query_handlers: Arc<HandlerTable<dyn QueryHandler<I>>> = Arc::new(HandlerTable::new());
        let srdi_handlers: Arc<HandlerTable<dyn SrdiHandler<I>>> = Arc::new(HandlerTable::new());

        let propagation = Arc::new(PropagationController::new(
            self.config.service_name.clone(),
            channels.clone(),
            Arc::clone(&endpoint),
            Arc::clone(&overlay),
            routes,
            FailureTracker::new(Arc::clone(&srdi_handlers)),
        ));

        let engine = Arc::new(DispatchEngine::new(
            channels.clone(),
            Arc::clone(&query_handlers),
            Arc::clone(&srdi_handlers),
            Arc::clone(&propagation),
            Arc::clone(&overlay),
        ));

        Ok(ResolverService {
            config: self.config,
            channels,
            endpoint,
            overlay,
            query_handlers,
            srdi_handlers,
            propagation,
            engine,
            started: AtomicBool::new(false),
        })
    }
}

/// The resolver engine for one group instance
pub struct ResolverService<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    config: ResolverConfig,
    channels: ChannelSet,
    endpoint: Arc<E>,
    overlay: Arc<O>,
    query_handlers: Arc<HandlerTable<dyn QueryHandler<I>>>,
    srdi_handlers: Arc<HandlerTable<dyn SrdiHandler<I>>>,
    propagation: Arc<PropagationController<I, E, O>>,
    engine: Arc<DispatchEngine<I, E, O>>,
    started: AtomicBool,
}

impl<I, E, O> ResolverService<I, E, O>
where
    I: PeerIdentity,
    E: Endpoint<I> + 'static,
    O: Overlay<I> + 'static,
{
    /// Start building a service
    pub fn builder(config: ResolverConfig) -> ResolverBuilder<I, E, O> {
        ResolverBuilder::new(config)
    }

    /// The derived channel names
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Whether the service is currently started
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Bind the three channel listeners
    ///
    /// Idempotent; a second call while started is a no-op. A rejected
    /// registration (someone else already bound the name) is logged and
    /// startup continues.
    pub fn start(&self) -> Result<(), ResolverError> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(service = %self.config.service_name, "Resolver already started");
            return Ok(());
        }

        self.bind_channel(
            &self.channels.query,
            Arc::new(QueryDemux::new(Arc::clone(&self.engine))),
        );
        self.bind_channel(
            &self.channels.response,
            Arc::new(ResponseDemux::new(Arc::clone(&self.engine))),
        );
        self.bind_channel(
            &self.channels.srdi,
            Arc::new(SrdiDemux::new(Arc::clone(&self.engine))),
        );

        debug!(service = %self.config.service_name, "Resolver service started");
        Ok(())
    }

    fn bind_channel(&self, channel: &str, listener: Arc<dyn ChannelListener<I>>) {
        if !self
            .endpoint
            .add_listener(&self.config.service_name, channel, Arc::clone(&listener))
        {
            error!(channel, "Cannot register channel listener (already registered)");
        }

        let propagate_name = format!("{}{}", self.config.service_name, channel);
        if !self.overlay.add_propagate_listener(&propagate_name, listener) {
            error!(channel, "Cannot register propagate listener (already registered)");
        }
    }

    /// Unbind all channel listeners
    ///
    /// Invocations already in flight on handler code are not cancelled.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }

        for channel in [
            &self.channels.query,
            &self.channels.response,
            &self.channels.srdi,
        ] {
            self.endpoint
                .remove_listener(&self.config.service_name, channel);
            self.overlay
                .remove_propagate_listener(&format!("{}{}", self.config.service_name, channel));
        }

        debug!(service = %self.config.service_name, "Resolver service stopped");
    }

    /// Bind a query handler, returning the previous binding if any
    pub fn register_query_handler(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn QueryHandler<I>>,
    ) -> Option<Arc<dyn QueryHandler<I>>> {
        self.query_handlers.register(name, handler)
    }

    /// Remove a query handler binding
    pub fn unregister_query_handler(&self, name: &str) -> Option<Arc<dyn QueryHandler<I>>> {
        self.query_handlers.unregister(name)
    }

    /// Look up a query handler by name
    pub fn query_handler(&self, name: &str) -> Option<Arc<dyn QueryHandler<I>>> {
        self.query_handlers.get(name)
    }

    /// Bind an index handler, returning the previous binding if any
    pub fn register_srdi_handler(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn SrdiHandler<I>>,
    ) -> Option<Arc<dyn SrdiHandler<I>>> {
        self.srdi_handlers.register(name, handler)
    }

    /// Remove an index handler binding
    pub fn unregister_srdi_handler(&self, name: &str) -> Option<Arc<dyn SrdiHandler<I>>> {
        self.srdi_handlers.unregister(name)
    }

    /// Look up an index handler by name
    pub fn srdi_handler(&self, name: &str) -> Option<Arc<dyn SrdiHandler<I>>> {
        self.srdi_handlers.get(name)
    }

    /// Send a query to a named peer, or flood it when none is named
    pub async fn send_query(
        &self,
        destination: Option<&I>,
        query: QueryMessage<I>,
    ) -> Result<(), ResolverError> {
        self.propagation.send_query(destination, query).await
    }

    /// Send a response to a named peer, or flood it when none is named
    pub async fn send_response(
        &self,
        destination: Option<&I>,
        response: ResponseMessage<I>,
    ) -> Result<(), ResolverError> {
        self.propagation.send_response(destination, response).await
    }

    /// Send an index message to a named peer, or flood it when none is named
    pub async fn send_srdi(
        &self,
        destination: Option<&I>,
        srdi: SrdiMessage,
    ) -> Result<(), ResolverError> {
        self.propagation.send_srdi(destination, srdi).await
    }
}
