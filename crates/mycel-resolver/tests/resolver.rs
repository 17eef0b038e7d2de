//! End-to-end resolver flows over the in-memory collaborators
//!
//! Two mock-backed nodes exchange real wire envelopes: what one node's
//! endpoint records as sent is handed verbatim to the other node's
//! listeners, so these tests cover encode, dispatch, and propagation
//! decisions together.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mycel_core::{
    DeliveryFailure, EndpointAddress, FailureCause, MockEndpoint, MockOverlay, SimPeerId,
};
use mycel_resolver::codec;
use mycel_resolver::{
    QueryHandler, QueryMessage, QueryOutcome, ResolverConfig, ResolverService, ResponseMessage,
    SrdiHandler, SrdiMessage,
};

type TestService = ResolverService<SimPeerId, MockEndpoint<SimPeerId>, MockOverlay<SimPeerId>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Node {
    id: SimPeerId,
    endpoint: Arc<MockEndpoint<SimPeerId>>,
    overlay: Arc<MockOverlay<SimPeerId>>,
    service: Arc<TestService>,
}

fn make_node(label: &str) -> Node {
    let id = SimPeerId::new(label).unwrap();
    let endpoint = Arc::new(MockEndpoint::new(id.clone()));
    let overlay = Arc::new(MockOverlay::new());
    let service = Arc::new(
        ResolverService::builder(ResolverConfig::new("resolver", "g"))
            .endpoint(Arc::clone(&endpoint))
            .overlay(Arc::clone(&overlay))
            .build()
            .unwrap(),
    );
    service.start().unwrap();
    Node {
        id,
        endpoint,
        overlay,
        service,
    }
}

/// Records everything it is handed; queries are consumed
struct Collector {
    queries: Mutex<Vec<QueryMessage<SimPeerId>>>,
    responses: Mutex<Vec<ResponseMessage<SimPeerId>>>,
}

impl Collector {
    fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl QueryHandler<SimPeerId> for Collector {
    async fn process_query(
        &self,
        query: QueryMessage<SimPeerId>,
        _source: &EndpointAddress<SimPeerId>,
    ) -> anyhow::Result<QueryOutcome> {
        self.queries.lock().unwrap().push(query);
        Ok(QueryOutcome::Ok)
    }

    async fn process_response(
        &self,
        response: ResponseMessage<SimPeerId>,
        _source: &EndpointAddress<SimPeerId>,
    ) -> anyhow::Result<()> {
        self.responses.lock().unwrap().push(response);
        Ok(())
    }
}

/// Answers every query by echoing its payload back to the sender
struct EchoResponder {
    service: Arc<TestService>,
}

#[async_trait]
impl QueryHandler<SimPeerId> for EchoResponder {
    async fn process_query(
        &self,
        query: QueryMessage<SimPeerId>,
        source: &EndpointAddress<SimPeerId>,
    ) -> anyhow::Result<QueryOutcome> {
        let response =
            ResponseMessage::new(query.handler_name.clone(), query.query_id, query.payload);
        self.service
            .send_response(Some(&source.peer), response)
            .await?;
        Ok(QueryOutcome::Ok)
    }

    async fn process_response(
        &self,
        _response: ResponseMessage<SimPeerId>,
        _source: &EndpointAddress<SimPeerId>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Records index messages and failure notifications
struct SrdiSink {
    messages: Mutex<Vec<SrdiMessage>>,
    failed: Mutex<Vec<SimPeerId>>,
}

impl SrdiSink {
    fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            failed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SrdiHandler<SimPeerId> for SrdiSink {
    async fn process_srdi(&self, message: SrdiMessage) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    async fn message_send_failed(
        &self,
        peer: &SimPeerId,
        _failure: &DeliveryFailure<SimPeerId>,
    ) -> anyhow::Result<()> {
        self.failed.lock().unwrap().push(peer.clone());
        Ok(())
    }
}

/// Fails on every notification; the broadcast must survive it
struct TouchySink;

#[async_trait]
impl SrdiHandler<SimPeerId> for TouchySink {
    async fn process_srdi(&self, _message: SrdiMessage) -> anyhow::Result<()> {
        Ok(())
    }

    async fn message_send_failed(
        &self,
        _peer: &SimPeerId,
        _failure: &DeliveryFailure<SimPeerId>,
    ) -> anyhow::Result<()> {
        anyhow::bail!("index table locked")
    }
}

#[tokio::test]
async fn test_query_response_round_trip() {
    init_tracing();
    let issuer = make_node("issuer");
    let responder = make_node("responder");

    let collector = Arc::new(Collector::new());
    issuer
        .service
        .register_query_handler("search", collector.clone());
    responder.service.register_query_handler(
        "search",
        Arc::new(EchoResponder {
            service: Arc::clone(&responder.service),
        }),
    );

    let query = QueryMessage::new("search", 77, b"find me".to_vec());
    issuer
        .service
        .send_query(Some(&responder.id), query)
        .await
        .unwrap();

    // Carry the wire envelope across to the responder.
    let outbound = issuer.endpoint.sent();
    assert_eq!(outbound.len(), 1);
    responder
        .endpoint
        .deliver(
            "resolver",
            "gORes",
            outbound[0].envelope.clone(),
            issuer.id.clone(),
        )
        .await;

    // The responder answered the issuer directly on the response channel.
    let answers = responder.endpoint.sent();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].address.peer, issuer.id);
    assert_eq!(answers[0].address.channel, "gIRes");

    issuer
        .endpoint
        .deliver(
            "resolver",
            "gIRes",
            answers[0].envelope.clone(),
            responder.id.clone(),
        )
        .await;

    let responses = collector.responses.lock().unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].query_id, 77);
    assert_eq!(responses[0].payload, b"find me".to_vec());
}

#[tokio::test]
async fn test_hub_refloods_unmatched_query() {
    init_tracing();
    let hub = make_node("hub");
    hub.overlay.set_hub(true);

    let query: QueryMessage<SimPeerId> = QueryMessage::new("nobody-home", 5, vec![]);
    let envelope = codec::encode("gORes", &query, false).unwrap();

    let source = EndpointAddress::new(SimPeerId::new("edge").unwrap(), "resolver", "gORes");

    // Arrives via the overlay's propagate path, as flooded queries do.
    hub.overlay
        .deliver_propagated(
            "resolvergORes",
            envelope.clone(),
            source.clone(),
            EndpointAddress::new(hub.id.clone(), "resolver", "gORes"),
        )
        .await;

    assert_eq!(hub.overlay.walks().len(), 1);
    assert_eq!(hub.overlay.neighbor_casts().len(), 1);

    // An edge node leaves re-flooding to its hub.
    let edge = make_node("edge2");
    edge.overlay
        .deliver_propagated(
            "resolvergORes",
            envelope,
            source,
            EndpointAddress::new(edge.id.clone(), "resolver", "gORes"),
        )
        .await;
    assert!(edge.overlay.walks().is_empty());
    assert!(edge.overlay.neighbor_casts().is_empty());
}

#[tokio::test]
async fn test_srdi_unicast_inflates_at_the_receiver() {
    init_tracing();
    let publisher = make_node("publisher");
    let hub = make_node("hub");
    hub.overlay.set_hub(true);

    let sink = Arc::new(SrdiSink::new());
    hub.service.register_srdi_handler("index", sink.clone());

    let msg = SrdiMessage::new("index", vec![9; 400]);
    publisher
        .service
        .send_srdi(Some(&hub.id), msg.clone())
        .await
        .unwrap();

    let outbound = publisher.endpoint.sent();
    assert_eq!(outbound.len(), 1);
    assert!(outbound[0].envelope.element("gSrdi").unwrap().is_compressed());

    hub.endpoint
        .deliver(
            "resolver",
            "gSrdi",
            outbound[0].envelope.clone(),
            publisher.id.clone(),
        )
        .await;

    assert_eq!(sink.messages.lock().unwrap().as_slice(), &[msg]);
}

#[tokio::test]
async fn test_failed_unicast_clears_index_handlers() {
    init_tracing();
    let node = make_node("node");

    let sink = Arc::new(SrdiSink::new());
    node.service.register_srdi_handler("idx", sink.clone());
    node.service.register_srdi_handler("idx2", Arc::new(TouchySink));

    let dead = SimPeerId::new("dead").unwrap();
    node.endpoint
        .fail_sends_to(dead.clone(), FailureCause::Transport("connection reset".into()));

    node.service
        .send_srdi(Some(&dead), SrdiMessage::new("idx", vec![1]))
        .await
        .unwrap();

    // idx was told exactly once, despite idx2 failing its own callback.
    assert_eq!(sink.failed.lock().unwrap().as_slice(), &[dead]);
}

#[tokio::test]
async fn test_over_forwarded_query_is_ignored() {
    init_tracing();
    let node = make_node("node");

    let collector = Arc::new(Collector::new());
    node.service
        .register_query_handler("search", collector.clone());

    let mut query: QueryMessage<SimPeerId> = QueryMessage::new("search", 3, vec![]);
    query.hop_count = 3;
    let envelope = codec::encode("gORes", &query, false).unwrap();

    node.endpoint
        .deliver("resolver", "gORes", envelope, SimPeerId::new("edge").unwrap())
        .await;

    assert!(collector.queries.lock().unwrap().is_empty());
    assert!(node.overlay.walks().is_empty());
}
