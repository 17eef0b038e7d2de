//! Resolver message kinds and channel naming
//!
//! Three message kinds travel over three logical channels sharing one
//! transport. Payloads are opaque to the engine; only the routing fields
//! (handler name, query id, hop count, source route) are interpreted.

use serde::{Deserialize, Serialize};

use mycel_core::{PeerIdentity, RouteAdvertisement};

/// Channel-name suffix for outbound queries
pub const QUERY_CHANNEL_SUFFIX: &str = "ORes";

/// Channel-name suffix for inbound responses
pub const RESPONSE_CHANNEL_SUFFIX: &str = "IRes";

/// Channel-name suffix for secondary-index propagation
pub const SRDI_CHANNEL_SUFFIX: &str = "Srdi";

/// The three derived channel names for one resolver instance
///
/// Built once from a group-unique prefix and immutable thereafter. Two
/// resolver instances sharing a transport must use distinct prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSet {
    /// Outbound query channel
    pub query: String,
    /// Inbound response channel
    pub response: String,
    /// Index propagation channel
    pub srdi: String,
}

impl ChannelSet {
    /// Derive the channel names from a group-unique prefix
    pub fn new(group_prefix: &str) -> Self {
        Self {
            query: format!("{}{}", group_prefix, QUERY_CHANNEL_SUFFIX),
            response: format!("{}{}", group_prefix, RESPONSE_CHANNEL_SUFFIX),
            srdi: format!("{}{}", group_prefix, SRDI_CHANNEL_SUFFIX),
        }
    }
}

/// A query addressed to a named handler somewhere on the overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: Serialize + for<'de2> Deserialize<'de2>")]
pub struct QueryMessage<I: PeerIdentity> {
    /// Name of the handler that should process this query
    pub handler_name: String,
    /// Issuer-chosen correlation id, echoed in responses
    pub query_id: u64,
    /// How many times an intermediary has forwarded this query
    ///
    /// Carried in the message and bumped by forwarding intermediaries;
    /// the engine reads it but never mutates it.
    pub hop_count: u32,
    /// Route back to the issuer, attached opportunistically
    pub src_route: Option<RouteAdvertisement<I>>,
    /// Opaque query body, owned by the handler protocol
    pub payload: Vec<u8>,
}

impl<I: PeerIdentity> QueryMessage<I> {
    /// Create a query with hop count zero and no source route
    pub fn new(handler_name: impl Into<String>, query_id: u64, payload: Vec<u8>) -> Self {
        Self {
            handler_name: handler_name.into(),
            query_id,
            hop_count: 0,
            src_route: None,
            payload,
        }
    }

    /// Record one more forwarding hop
    pub fn increment_hop_count(&mut self) {
        self.hop_count = self.hop_count.saturating_add(1);
    }
}

/// A response to a previously issued query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: Serialize + for<'de2> Deserialize<'de2>")]
pub struct ResponseMessage<I: PeerIdentity> {
    /// Name of the handler the response is for
    pub handler_name: String,
    /// Correlation id of the query being answered
    pub query_id: u64,
    /// Route to the query issuer, if the query carried one
    pub src_route: Option<RouteAdvertisement<I>>,
    /// Opaque response body
    pub payload: Vec<u8>,
}

impl<I: PeerIdentity> ResponseMessage<I> {
    /// Create a response with no source route
    pub fn new(handler_name: impl Into<String>, query_id: u64, payload: Vec<u8>) -> Self {
        Self {
            handler_name: handler_name.into(),
            query_id,
            src_route: None,
            payload,
        }
    }
}

/// A secondary-index propagation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrdiMessage {
    /// Name of the index handler the message is for
    pub handler_name: String,
    /// Opaque index body
    pub payload: Vec<u8>,
    /// Whether the body should be gzip-compressed on the wire
    ///
    /// Index payloads are assumed large and compressible, so this
    /// defaults to true.
    pub compress: bool,
}

impl SrdiMessage {
    /// Create an index message that compresses on the wire
    pub fn new(handler_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            handler_name: handler_name.into(),
            payload,
            compress: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycel_core::SimPeerId;

    #[test]
    fn test_channel_set_derivation() {
        let channels = ChannelSet::new("grp1-");
        assert_eq!(channels.query, "grp1-ORes");
        assert_eq!(channels.response, "grp1-IRes");
        assert_eq!(channels.srdi, "grp1-Srdi");
    }

    #[test]
    fn test_query_starts_at_hop_zero() {
        let mut query: QueryMessage<SimPeerId> = QueryMessage::new("search", 7, vec![1]);
        assert_eq!(query.hop_count, 0);
        assert!(query.src_route.is_none());

        query.increment_hop_count();
        query.increment_hop_count();
        assert_eq!(query.hop_count, 2);
    }

    #[test]
    fn test_srdi_defaults_to_compressed() {
        let msg = SrdiMessage::new("index", vec![0; 64]);
        assert!(msg.compress);
    }
}
