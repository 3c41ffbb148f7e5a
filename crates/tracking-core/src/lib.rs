//! Canonical tracking model and carrier-agnostic machinery
//!
//! Everything carrier-independent lives here: the canonical result/event
//! model every normalizer converges to, the error taxonomy, the ordered
//! substring status matcher, the resilient HTTP executor with retry and
//! rate-limit backoff, and the `CarrierTracker` capability trait the
//! per-carrier implementations fill in.
//!
//! The executor deliberately does not interpret business-level HTTP
//! statuses (401 handling belongs to the tracker facade, 404 to the
//! normalizer's caller); it only decides retryable vs terminal.

pub mod error;
pub mod executor;
pub mod model;
pub mod status;
pub mod tracker;

pub use error::{Result, TrackingError};
pub use executor::{RequestSpec, ResilientExecutor};
pub use model::{
    Carrier, PackageLocation, TrackingEvent, TrackingResult, TrackingStatus,
    sort_events_chronological,
};
pub use status::{StatusRule, match_status};
pub use tracker::{BoxFuture, CarrierTracker, check_batch};
