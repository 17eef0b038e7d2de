//! Contracts for pluggable handler components
//!
//! Handlers are owned by the registering application; the engine holds
//! shared references and invokes them inside an isolation boundary, so a
//! handler fault never escapes into the dispatch loop.

use async_trait::async_trait;

use mycel_core::{DeliveryFailure, EndpointAddress, PeerIdentity};

use crate::message::{QueryMessage, ResponseMessage, SrdiMessage};

/// What the dispatch engine should do after a query was processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The query was consumed (or must be suppressed); do not forward it
    Ok,
    /// Nobody here could answer; the caller should re-flood the query
    Repropagate,
}

/// A handler for queries and their responses
///
/// Responses resolve against the same registry namespace as queries: the
/// component that asks is the component that hears the answer.
#[async_trait]
pub trait QueryHandler<I: PeerIdentity>: Send + Sync {
    /// Process one inbound query
    ///
    /// `source` is whoever handed us the query; it may not be the issuer.
    async fn process_query(
        &self,
        query: QueryMessage<I>,
        source: &EndpointAddress<I>,
    ) -> anyhow::Result<QueryOutcome>;

    /// Process one inbound response
    async fn process_response(
        &self,
        response: ResponseMessage<I>,
        source: &EndpointAddress<I>,
    ) -> anyhow::Result<()>;
}

/// A handler for secondary-index messages
#[async_trait]
pub trait SrdiHandler<I: PeerIdentity>: Send + Sync {
    /// Process one inbound index message
    async fn process_srdi(&self, message: SrdiMessage) -> anyhow::Result<()>;

    /// A unicast to `peer` failed for real; drop index entries that
    /// point at it
    async fn message_send_failed(
        &self,
        peer: &I,
        failure: &DeliveryFailure<I>,
    ) -> anyhow::Result<()>;
}
