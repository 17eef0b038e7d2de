//! # Mycel Resolver
//!
//! Query-resolution protocol engine for the Mycel overlay: a generic
//! request/response/index-propagation layer used by higher-level services
//! (search, discovery, distributed indexing) to exchange opaque queries
//! across a partially-connected network of peers.
//!
//! The engine routes, demultiplexes, and propagates messages on behalf of
//! pluggable handlers; it implements no search logic itself.
//!
//! ## Key Types
//!
//! - [`ResolverService`]: Lifecycle and facade; binds the three channels
//! - [`QueryHandler`] / [`SrdiHandler`]: Contracts for pluggable handlers
//! - [`QueryMessage`] / [`ResponseMessage`] / [`SrdiMessage`]: The three
//!   resolver message kinds
//! - [`PropagationController`]: Flood-vs-unicast decisions and re-flooding
//!
//! ## Channels
//!
//! Three logical channels are multiplexed over one shared transport via
//! tagged envelope elements: outbound queries (`ORes`), inbound responses
//! (`IRes`), and secondary-index propagation (`Srdi`). Channel names are
//! derived once from a group-unique prefix and stay stable for the
//! service's lifetime.

pub mod codec;
mod dispatch;
pub mod error;
mod failure;
pub mod handler;
pub mod message;
pub mod propagation;
pub mod registry;
pub mod routes;
pub mod service;

// Re-export main types
pub use error::*;
pub use handler::*;
pub use message::*;
pub use propagation::PropagationController;
pub use registry::HandlerTable;
pub use routes::RouteAnnotator;
pub use service::{ResolverBuilder, ResolverConfig, ResolverService};
