//! Error types for the Mycel core abstractions

use thiserror::Error;

/// Errors related to peer identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Invalid identity length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Errors related to the unicast transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Address resolution failed: {0}")]
    AddressResolutionFailed(String),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Errors related to the overlay flood substrate
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Walk failed: {0}")]
    WalkFailed(String),

    #[error("Neighbor propagate failed: {0}")]
    PropagateFailed(String),
}
