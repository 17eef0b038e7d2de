//! Delivery-failure tracking
//!
//! Every unicast send carries an observer bound to its destination. A
//! confirmed non-transient failure means index entries pointing at that
//! peer are stale, so every registered index handler is told to drop them.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::warn;

use mycel_core::{DeliveryFailure, DeliveryObserver, PeerIdentity};

use crate::handler::SrdiHandler;
use crate::registry::HandlerTable;

/// Builds per-destination delivery observers over the index registry
pub(crate) struct FailureTracker<I: PeerIdentity> {
    srdi_handlers: Arc<HandlerTable<dyn SrdiHandler<I>>>,
}

impl<I: PeerIdentity> FailureTracker<I> {
    pub(crate) fn new(srdi_handlers: Arc<HandlerTable<dyn SrdiHandler<I>>>) -> Self {
        Self { srdi_handlers }
    }

    /// An observer bound to one destination peer
    pub(crate) fn observer_for(&self, peer: I) -> Arc<dyn DeliveryObserver<I>> {
        Arc::new(InvalidationObserver {
            peer,
            srdi_handlers: Arc::clone(&self.srdi_handlers),
        })
    }
}

struct InvalidationObserver<I: PeerIdentity> {
    peer: I,
    srdi_handlers: Arc<HandlerTable<dyn SrdiHandler<I>>>,
}

#[async_trait]
impl<I: PeerIdentity> DeliveryObserver<I> for InvalidationObserver<I> {
    async fn delivery_failed(&self, failure: DeliveryFailure<I>) {
        // Queue overflow is momentary; the send may still drain.
        if failure.cause.is_transient() {
            return;
        }

        warn!(peer = %self.peer, cause = %failure.cause, "Clearing index entries for failed peer");

        // Each notification is isolated: one handler's fault must not
        // starve the rest of the invalidation.
        for (name, handler) in self.srdi_handlers.snapshot() {
            let call = AssertUnwindSafe(handler.message_send_failed(&self.peer, &failure))
                .catch_unwind()
                .await;
            match call {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    warn!(handler = %name, %error, "Index handler failed during invalidation");
                }
                Err(_) => {
                    warn!(handler = %name, "Index handler panicked during invalidation");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SrdiMessage;
    use mycel_core::{FailureCause, SimPeerId};
    use std::sync::Mutex;

    fn make_id(label: &str) -> SimPeerId {
        SimPeerId::new(label).unwrap()
    }

    struct CountingHandler {
        failed_peers: Mutex<Vec<SimPeerId>>,
    }

    impl CountingHandler {
        fn new() -> Self {
            Self {
                failed_peers: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SrdiHandler<SimPeerId> for CountingHandler {
        async fn process_srdi(&self, _message: SrdiMessage) -> anyhow::Result<()> {
            Ok(())
        }

        async fn message_send_failed(
            &self,
            peer: &SimPeerId,
            _failure: &DeliveryFailure<SimPeerId>,
        ) -> anyhow::Result<()> {
            self.failed_peers.lock().unwrap().push(peer.clone());
            Ok(())
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl SrdiHandler<SimPeerId> for PanickingHandler {
        async fn process_srdi(&self, _message: SrdiMessage) -> anyhow::Result<()> {
            Ok(())
        }

        async fn message_send_failed(
            &self,
            _peer: &SimPeerId,
            _failure: &DeliveryFailure<SimPeerId>,
        ) -> anyhow::Result<()> {
            panic!("index table corrupted");
        }
    }

    fn make_tracker(
        handlers: &[(&str, Arc<dyn SrdiHandler<SimPeerId>>)],
    ) -> FailureTracker<SimPeerId> {
        let table: Arc<HandlerTable<dyn SrdiHandler<SimPeerId>>> = Arc::new(HandlerTable::new());
        for (name, handler) in handlers {
            table.register(*name, Arc::clone(handler));
        }
        FailureTracker::new(table)
    }

    #[tokio::test]
    async fn test_overflow_is_ignored() {
        let counting = Arc::new(CountingHandler::new());
        let tracker = make_tracker(&[("idx", counting.clone())]);

        let peer = make_id("P");
        let observer = tracker.observer_for(peer.clone());
        observer
            .delivery_failed(DeliveryFailure::new(peer, FailureCause::QueueOverflow))
            .await;

        assert!(counting.failed_peers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_real_failure_notifies_every_handler() {
        let counting = Arc::new(CountingHandler::new());
        let tracker = make_tracker(&[
            ("idx", counting.clone()),
            ("idx2", Arc::new(PanickingHandler)),
        ]);

        let peer = make_id("P");
        let observer = tracker.observer_for(peer.clone());
        observer
            .delivery_failed(DeliveryFailure::new(
                peer.clone(),
                FailureCause::Unreachable("link down".into()),
            ))
            .await;

        // idx heard about the failure exactly once, even though idx2
        // panicked during its own notification.
        let failed = counting.failed_peers.lock().unwrap();
        assert_eq!(failed.as_slice(), &[peer]);
    }

    #[tokio::test]
    async fn test_success_is_a_noop() {
        let counting = Arc::new(CountingHandler::new());
        let tracker = make_tracker(&[("idx", counting.clone())]);

        let peer = make_id("P");
        let observer = tracker.observer_for(peer.clone());
        observer.delivery_succeeded(&peer).await;

        assert!(counting.failed_peers.lock().unwrap().is_empty());
    }
}
