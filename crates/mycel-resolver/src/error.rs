//! Error types for the resolver engine

use thiserror::Error;

use mycel_core::{OverlayError, TransportError};

/// Errors from the envelope codec
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Envelope has no element tagged {0}")]
    MissingElement(String),

    #[error("Document serialization failed: {0}")]
    Serialize(postcard::Error),

    #[error("Document parse failed: {0}")]
    Deserialize(postcard::Error),

    #[error("Gzip deflate failed: {0}")]
    Compress(std::io::Error),

    #[error("Gzip inflate failed: {0}")]
    Decompress(std::io::Error),
}

/// Top-level error type for resolver operations
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] CodecError),

    #[error("No sender could be resolved for peer {0}")]
    UnresolvedDestination(String),

    #[error("{0} is not available yet; start again later")]
    DependencyNotReady(&'static str),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Overlay error: {0}")]
    Overlay(#[from] OverlayError),
}

impl ResolverError {
    /// Whether the caller should retry later rather than give up
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DependencyNotReady(_))
    }
}
