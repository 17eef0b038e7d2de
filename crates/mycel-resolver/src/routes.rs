//! Route annotation façade
//!
//! Wraps the transport's optional route-control capability. When the
//! capability is absent both operations degrade to no-ops, so callers
//! never branch on availability themselves.

use std::sync::Arc;

use tracing::debug;

use mycel_core::{PeerIdentity, RouteAdvertisement, RouteControl, RouteStatus};

/// Thin façade over an optional route-control capability
pub struct RouteAnnotator<I: PeerIdentity> {
    control: Option<Arc<dyn RouteControl<I>>>,
}

impl<I: PeerIdentity> RouteAnnotator<I> {
    /// Wrap whatever capability the endpoint exposed (possibly none)
    pub fn new(control: Option<Arc<dyn RouteControl<I>>>) -> Self {
        Self { control }
    }

    /// Whether a route capability is available
    pub fn is_available(&self) -> bool {
        self.control.is_some()
    }

    /// This node's own route, as an owned copy
    ///
    /// Returns `None` when no capability is present or no local route is
    /// known yet.
    pub fn local_route(&self) -> Option<RouteAdvertisement<I>> {
        self.control.as_ref().and_then(|control| control.local_route())
    }

    /// Feed a route learned from a received message to the transport
    ///
    /// Best-effort; returns false when the capability is absent or the
    /// route was rejected, with no side effect.
    pub fn add_route(&self, route: RouteAdvertisement<I>) -> bool {
        let Some(control) = &self.control else {
            debug!(peer = %route.peer, "No route capability; dropping learned route");
            return false;
        };
        control.add_route(route) == RouteStatus::Added
    }
}
