//! Canonical, carrier-independent tracking model
//!
//! Every carrier payload normalizes into these shapes. Timestamps are
//! carrier-local wall time (`NaiveDateTime`); ISO inputs carrying a zone
//! are reduced to their UTC wall-clock component at parse time.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Supported shipping carriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    Fedex,
    Ups,
    Dhl,
    Ontrac,
}

impl Carrier {
    pub const ALL: [Carrier; 4] = [Carrier::Fedex, Carrier::Ups, Carrier::Dhl, Carrier::Ontrac];

    pub fn as_str(&self) -> &'static str {
        match self {
            Carrier::Fedex => "fedex",
            Carrier::Ups => "ups",
            Carrier::Dhl => "dhl",
            Carrier::Ontrac => "ontrac",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical package status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Pending,
    LabelCreated,
    InTransit,
    OutForDelivery,
    Delivered,
    Exception,
    NotFound,
    Unknown,
    Error,
}

/// Where a scan happened or where a package is headed. All parts optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

impl PackageLocation {
    pub fn is_empty(&self) -> bool {
        self.city.is_none()
            && self.state.is_none()
            && self.country.is_none()
            && self.postal_code.is_none()
    }
}

impl fmt::Display for PackageLocation {
    /// Joins the populated parts with ", " (city, state, postal code,
    /// country), the shape carriers use for display addresses.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [
            self.city.as_deref(),
            self.state.as_deref(),
            self.postal_code.as_deref(),
            self.country.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect();
        f.write_str(&parts.join(", "))
    }
}

/// One scan in a package's journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// When the event occurred (carrier-local wall time)
    pub timestamp: NaiveDateTime,
    /// Human-readable event description
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PackageLocation>,
    /// Carrier-native status code, when the payload carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
}

/// Complete tracking information for one package.
///
/// Always constructible: lookup and parse failures become a result with
/// `status` of `error`/`not_found` and an `error_message`, never a raised
/// error. Created fresh per tracking call and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResult {
    pub tracking_number: String,
    pub carrier: Carrier,
    pub status: TrackingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<NaiveDateTime>,
    /// Chronological (ascending) list of tracking events
    #[serde(default)]
    pub events: Vec<TrackingEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<PackageLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PackageLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_numbers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Raw carrier payload for diagnostics, when the tracker keeps it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<serde_json::Value>,
}

impl TrackingResult {
    /// Empty result scaffold with the given status.
    pub fn new(
        tracking_number: impl Into<String>,
        carrier: Carrier,
        status: TrackingStatus,
    ) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            carrier,
            status,
            estimated_delivery: None,
            delivered_at: None,
            events: Vec::new(),
            origin: None,
            destination: None,
            delivery_address: None,
            service_type: None,
            weight: None,
            dimensions: None,
            reference_numbers: Vec::new(),
            error_message: None,
            raw_payload: None,
        }
    }

    /// Result for a per-package failure (parse error, lookup failure, …).
    pub fn error(
        tracking_number: impl Into<String>,
        carrier: Carrier,
        message: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(tracking_number, carrier, TrackingStatus::Error);
        result.error_message = Some(message.into());
        result
    }

    /// Result for a tracking number the carrier does not know.
    pub fn not_found(
        tracking_number: impl Into<String>,
        carrier: Carrier,
        message: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(tracking_number, carrier, TrackingStatus::NotFound);
        result.error_message = Some(message.into());
        result
    }
}

/// Sort events ascending by timestamp.
///
/// The sort is stable, so events sharing a timestamp keep the order the
/// carrier reported them in, which is the deterministic tie-break.
pub fn sort_events_chronological(events: &mut [TrackingEvent]) {
    events.sort_by_key(|e| e.timestamp);
}
