//! Per-carrier trackers behind one canonical interface
//!
//! One module per carrier, each owning its auth wiring, request shapes,
//! payload normalization, and status-mapping precedence. The
//! `CarrierRegistry` holds the configured trackers and serves the three
//! front-end contracts: `track`, `track_batch`, `validate_format`.
//!
//! Format validation is exposed as free functions per carrier and a
//! carrier-dispatched `validate_format`: pure pattern checks that work
//! with zero configured credentials.

use std::collections::HashMap;
use std::sync::Arc;

pub mod config;
pub mod constants;
pub mod dhl;
pub mod fedex;
pub mod ontrac;
pub mod ups;

mod support;
mod xml;

pub use config::{OauthConfig, OntracConfig, SharedConfig};
pub use dhl::DhlTracker;
pub use fedex::FedexTracker;
pub use ontrac::OntracTracker;
pub use ups::UpsTracker;

use tracking_core::{Carrier, CarrierTracker, Result, TrackingError, TrackingResult};

/// Pure format validation for any carrier. Needs no credentials, no
/// registry, and performs no I/O.
pub fn validate_format(carrier: Carrier, tracking_number: &str) -> bool {
    match carrier {
        Carrier::Fedex => fedex::validate_format(tracking_number),
        Carrier::Ups => ups::validate_format(tracking_number),
        Carrier::Dhl => dhl::validate_format(tracking_number),
        Carrier::Ontrac => ontrac::validate_format(tracking_number),
    }
}

/// The carrier's batch capability, independent of configuration.
pub fn max_batch_size(carrier: Carrier) -> usize {
    match carrier {
        Carrier::Fedex => fedex::MAX_BATCH_SIZE,
        Carrier::Ups => ups::MAX_BATCH_SIZE,
        Carrier::Dhl => dhl::MAX_BATCH_SIZE,
        Carrier::Ontrac => ontrac::MAX_BATCH_SIZE,
    }
}

/// Configured trackers keyed by carrier.
///
/// Carriers without credentials are simply absent; tracking them yields
/// `NotConfigured` while `validate_format` keeps working for every
/// carrier.
#[derive(Default)]
pub struct CarrierRegistry {
    trackers: HashMap<Carrier, Arc<dyn CarrierTracker>>,
}

impl CarrierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tracker under the carrier it reports.
    pub fn register(&mut self, tracker: Arc<dyn CarrierTracker>) {
        self.trackers.insert(tracker.carrier(), tracker);
    }

    /// Carriers with a configured tracker.
    pub fn configured(&self) -> Vec<Carrier> {
        let mut carriers: Vec<Carrier> = self.trackers.keys().copied().collect();
        carriers.sort_by_key(|c| c.as_str());
        carriers
    }

    pub fn is_configured(&self, carrier: Carrier) -> bool {
        self.trackers.contains_key(&carrier)
    }

    fn get(&self, carrier: Carrier) -> Result<&Arc<dyn CarrierTracker>> {
        self.trackers
            .get(&carrier)
            .ok_or(TrackingError::NotConfigured { carrier })
    }

    /// Track one package with the named carrier.
    pub async fn track(&self, carrier: Carrier, tracking_number: &str) -> Result<TrackingResult> {
        self.get(carrier)?.track(tracking_number).await
    }

    /// Track a batch with the named carrier. Output order matches input
    /// order and output length always equals input length.
    pub async fn track_batch(
        &self,
        carrier: Carrier,
        tracking_numbers: &[String],
    ) -> Result<Vec<TrackingResult>> {
        self.get(carrier)?.track_batch(tracking_numbers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracking_core::{BoxFuture, TrackingStatus};

    #[test]
    fn validate_format_dispatches_per_carrier() {
        assert!(validate_format(Carrier::Fedex, "123456789012"));
        assert!(!validate_format(Carrier::Ups, "123456789"));
        assert!(validate_format(Carrier::Ups, "1Z999AA10123456784"));
        assert!(validate_format(Carrier::Dhl, "1234567890"));
        assert!(validate_format(Carrier::Ontrac, "C10000000000001"));
        assert!(!validate_format(Carrier::Ontrac, "1Z999AA10123456784"));
    }

    #[test]
    fn batch_capabilities_are_fixed_properties() {
        assert_eq!(max_batch_size(Carrier::Fedex), 30);
        assert_eq!(max_batch_size(Carrier::Ups), 10);
        assert_eq!(max_batch_size(Carrier::Dhl), 10);
        assert_eq!(max_batch_size(Carrier::Ontrac), 1);
    }

    struct FixedTracker(Carrier);

    impl CarrierTracker for FixedTracker {
        fn carrier(&self) -> Carrier {
            self.0
        }
        fn max_batch_size(&self) -> usize {
            10
        }
        fn validate_format(&self, _tracking_number: &str) -> bool {
            true
        }
        fn track<'a>(
            &'a self,
            tracking_number: &'a str,
        ) -> BoxFuture<'a, Result<TrackingResult>> {
            Box::pin(async move {
                Ok(TrackingResult::new(
                    tracking_number,
                    self.0,
                    TrackingStatus::InTransit,
                ))
            })
        }
        fn track_batch<'a>(
            &'a self,
            tracking_numbers: &'a [String],
        ) -> BoxFuture<'a, Result<Vec<TrackingResult>>> {
            Box::pin(async move {
                let mut results = Vec::new();
                for number in tracking_numbers {
                    results.push(self.track(number).await?);
                }
                Ok(results)
            })
        }
    }

    #[tokio::test]
    async fn unconfigured_carrier_is_an_error() {
        let registry = CarrierRegistry::new();
        let err = registry.track(Carrier::Fedex, "123456789012").await.unwrap_err();
        assert!(matches!(err, TrackingError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn registered_tracker_serves_requests() {
        let mut registry = CarrierRegistry::new();
        registry.register(Arc::new(FixedTracker(Carrier::Ups)));

        assert!(registry.is_configured(Carrier::Ups));
        assert!(!registry.is_configured(Carrier::Dhl));
        assert_eq!(registry.configured(), vec![Carrier::Ups]);

        let result = registry.track(Carrier::Ups, "1Z1").await.unwrap();
        assert_eq!(result.carrier, Carrier::Ups);

        let numbers = vec!["a".to_string(), "b".to_string()];
        let results = registry.track_batch(Carrier::Ups, &numbers).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
