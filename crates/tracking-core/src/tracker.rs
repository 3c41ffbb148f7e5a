//! Carrier tracker capability trait
//!
//! Carriers differ in auth scheme, batch support, and payload format but
//! expose the same capability surface. The trait uses boxed futures so
//! trackers can live behind `Arc<dyn CarrierTracker>` in a registry.

use std::future::Future;
use std::pin::Pin;

use crate::error::{Result, TrackingError};
use crate::model::{Carrier, TrackingResult};

/// Boxed future alias for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Uniform per-carrier tracking contract.
///
/// `validate_format` is pure (no I/O, no credentials). `track` fails
/// outright on auth/transport problems; `track_batch` isolates every
/// per-number failure into an error result and only fails as a whole for
/// structurally invalid input (empty or over-limit batches).
pub trait CarrierTracker: Send + Sync {
    /// Which carrier this tracker serves.
    fn carrier(&self) -> Carrier;

    /// Maximum tracking numbers accepted by `track_batch`.
    fn max_batch_size(&self) -> usize;

    /// Pure format check for this carrier's tracking numbers.
    fn validate_format(&self, tracking_number: &str) -> bool;

    /// Track a single package.
    fn track<'a>(&'a self, tracking_number: &'a str) -> BoxFuture<'a, Result<TrackingResult>>;

    /// Track a batch; the returned list always has one entry per input,
    /// in input order.
    fn track_batch<'a>(
        &'a self,
        tracking_numbers: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<TrackingResult>>>;
}

/// Reject structurally invalid batches before any network call.
pub fn check_batch(
    carrier: Carrier,
    tracking_numbers: &[String],
    max_batch_size: usize,
) -> Result<()> {
    if tracking_numbers.is_empty() {
        return Err(TrackingError::InvalidBatch {
            carrier,
            message: "no tracking numbers provided".into(),
        });
    }
    if tracking_numbers.len() > max_batch_size {
        return Err(TrackingError::InvalidBatch {
            carrier,
            message: format!("too many tracking numbers, maximum allowed: {max_batch_size}"),
        });
    }
    Ok(())
}
