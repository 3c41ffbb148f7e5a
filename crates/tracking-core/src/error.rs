//! Error taxonomy for tracking operations
//!
//! Format and batch-shape violations reject synchronously before any
//! I/O. Authentication and transport failures propagate from single
//! `track` calls; batch calls isolate them into per-number error
//! results. Normalizer failures never appear here at all; they degrade
//! into `TrackingResult` error values.

use crate::model::Carrier;

/// Errors surfaced by trackers and the resilient executor.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    /// Credential acquisition or refresh failed, or the carrier rejected
    /// a refreshed credential.
    #[error("{carrier} authentication failed: {message}")]
    Authentication {
        carrier: Carrier,
        message: String,
        /// HTTP status from the token endpoint or carrier, when known
        status: Option<u16>,
    },

    /// 429 responses exhausted every allowed retry.
    #[error("rate limited by {carrier} API")]
    RateLimit { carrier: Carrier },

    /// Format validation failed before any network call.
    #[error("invalid {carrier} tracking number format: {tracking_number}")]
    InvalidTrackingNumber {
        carrier: Carrier,
        tracking_number: String,
    },

    /// Batch rejected before any network call (empty or over the
    /// carrier's limit).
    #[error("invalid {carrier} batch request: {message}")]
    InvalidBatch { carrier: Carrier, message: String },

    /// No credentials were configured for this carrier.
    #[error("carrier {carrier} is not configured")]
    NotConfigured { carrier: Carrier },

    /// Network, transport, or unexpected-response failure with carrier
    /// context.
    #[error("{carrier} request failed: {message}")]
    Request { carrier: Carrier, message: String },
}

impl TrackingError {
    /// The carrier this error belongs to.
    pub fn carrier(&self) -> Carrier {
        match self {
            TrackingError::Authentication { carrier, .. }
            | TrackingError::RateLimit { carrier }
            | TrackingError::InvalidTrackingNumber { carrier, .. }
            | TrackingError::InvalidBatch { carrier, .. }
            | TrackingError::NotConfigured { carrier }
            | TrackingError::Request { carrier, .. } => *carrier,
        }
    }
}

/// Result alias for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;
