//! FedEx package tracking
//!
//! FedEx exposes a native batch endpoint: one POST to
//! `/track/v1/trackingnumbers` carries up to 30 numbers and answers with
//! `output.completeTrackResults`, which is re-matched to the request
//! list by tracking-number identity. Numbers the response omits get a
//! synthesized error result so output length always equals input length.
//! Auth is OAuth client-credentials with the client id/secret in the
//! form body.

use std::sync::{Arc, LazyLock};

use carrier_auth::{CarrierAuth, ClientCredentials, TokenEndpoint, TokenManager};
use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};

use tracking_core::{
    BoxFuture, Carrier, CarrierTracker, PackageLocation, RequestSpec, ResilientExecutor, Result,
    StatusRule, TrackingError, TrackingEvent, TrackingResult, TrackingStatus, check_batch,
    match_status, sort_events_chronological,
};

use crate::config::{OauthConfig, SharedConfig};
use crate::constants;
use crate::support::{
    clean_tracking_number, parse_iso_naive, read_json, scalar_to_string, send_authorized,
};

/// FedEx accepts up to 30 tracking numbers per batch request.
pub const MAX_BATCH_SIZE: usize = 30;

/// Express (12), Ground (14), SmartPost (15), Ground barcode (22).
static FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{12}|\d{14}|\d{15}|\d{22})$").expect("static pattern"));

/// Pure format check; accepts incidental spacing and punctuation.
pub fn validate_format(tracking_number: &str) -> bool {
    let clean = clean_tracking_number(tracking_number);
    !clean.is_empty() && FORMAT.is_match(&clean)
}

/// Keyword precedence for `latestStatusDetail.description`.
const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        terms: &["delivered"],
        status: TrackingStatus::Delivered,
    },
    StatusRule {
        terms: &["out for delivery"],
        status: TrackingStatus::OutForDelivery,
    },
    StatusRule {
        terms: &["in transit", "departed", "arrived", "scanned"],
        status: TrackingStatus::InTransit,
    },
    StatusRule {
        terms: &["exception", "delayed", "weather", "unable"],
        status: TrackingStatus::Exception,
    },
    StatusRule {
        terms: &["pending"],
        status: TrackingStatus::Pending,
    },
];

fn map_status(description: &str) -> TrackingStatus {
    if description.is_empty() {
        return TrackingStatus::Pending;
    }
    match_status(description, STATUS_RULES).unwrap_or(TrackingStatus::InTransit)
}

pub struct FedexTracker {
    auth: CarrierAuth,
    executor: ResilientExecutor,
    api_url: String,
}

impl FedexTracker {
    pub fn new(config: &OauthConfig, shared: &SharedConfig, client: reqwest::Client) -> Self {
        let base = constants::fedex_base_url(config.sandbox);
        let endpoint = TokenEndpoint::new(
            format!("{base}{}", constants::FEDEX_TOKEN_PATH),
            ClientCredentials::Form {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            },
        );
        let manager = TokenManager::new(
            endpoint,
            client.clone(),
            shared.request_timeout,
            shared.refresh_buffer,
        );
        Self {
            auth: CarrierAuth::Bearer(Arc::new(manager)),
            executor: ResilientExecutor::new(
                client,
                Carrier::Fedex,
                shared.request_timeout,
                shared.max_retries,
            ),
            api_url: format!("{base}/track/v1/trackingnumbers"),
        }
    }

    /// One batch POST for the given (pre-validated) numbers. The returned
    /// list is in `numbers` order with synthesized error results for
    /// numbers missing from the response.
    async fn request_batch(&self, numbers: &[&str]) -> Result<Vec<TrackingResult>> {
        let payload = json!({
            "includeDetailedScans": true,
            "trackingInfo": numbers
                .iter()
                .map(|n| json!({"trackingNumberInfo": {"trackingNumber": n}}))
                .collect::<Vec<_>>(),
        });

        info!(count = numbers.len(), "tracking FedEx packages");
        let response = send_authorized(Carrier::Fedex, &self.executor, &self.auth, || {
            RequestSpec::post(self.api_url.clone()).json(payload.clone())
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackingError::Request {
                carrier: Carrier::Fedex,
                message: format!("tracking request failed: HTTP {} - {body}", status.as_u16()),
            });
        }

        let body = read_json(Carrier::Fedex, response).await?;
        Ok(parse_batch_response(&body, numbers))
    }
}

impl CarrierTracker for FedexTracker {
    fn carrier(&self) -> Carrier {
        Carrier::Fedex
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    fn validate_format(&self, tracking_number: &str) -> bool {
        validate_format(tracking_number)
    }

    fn track<'a>(&'a self, tracking_number: &'a str) -> BoxFuture<'a, Result<TrackingResult>> {
        Box::pin(async move {
            if !validate_format(tracking_number) {
                return Err(TrackingError::InvalidTrackingNumber {
                    carrier: Carrier::Fedex,
                    tracking_number: tracking_number.to_string(),
                });
            }
            let mut results = self.request_batch(&[tracking_number]).await?;
            Ok(results.pop().unwrap_or_else(|| {
                TrackingResult::error(tracking_number, Carrier::Fedex, "empty tracking response")
            }))
        })
    }

    fn track_batch<'a>(
        &'a self,
        tracking_numbers: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<TrackingResult>>> {
        Box::pin(async move {
            check_batch(Carrier::Fedex, tracking_numbers, MAX_BATCH_SIZE)?;

            let valid: Vec<&str> = tracking_numbers
                .iter()
                .map(String::as_str)
                .filter(|n| validate_format(n))
                .collect();

            let fetched = if valid.is_empty() {
                Vec::new()
            } else {
                match self.request_batch(&valid).await {
                    Ok(results) => results,
                    Err(err) => {
                        // One shared request serves the whole batch, so a
                        // request-level failure degrades every member.
                        warn!(error = %err, "FedEx batch request failed");
                        let message = format!("tracking failed: {err}");
                        valid
                            .iter()
                            .map(|n| TrackingResult::error(*n, Carrier::Fedex, message.clone()))
                            .collect()
                    }
                }
            };

            let mut fetched = fetched.into_iter();
            Ok(tracking_numbers
                .iter()
                .map(|number| {
                    if validate_format(number) {
                        fetched.next().unwrap_or_else(|| {
                            TrackingResult::error(
                                number,
                                Carrier::Fedex,
                                "missing from carrier response",
                            )
                        })
                    } else {
                        TrackingResult::error(
                            number,
                            Carrier::Fedex,
                            TrackingError::InvalidTrackingNumber {
                                carrier: Carrier::Fedex,
                                tracking_number: number.clone(),
                            }
                            .to_string(),
                        )
                    }
                })
                .collect())
        })
    }
}

/// Re-match response entries to the requested numbers.
fn parse_batch_response(body: &Value, requested: &[&str]) -> Vec<TrackingResult> {
    let empty = Vec::new();
    let entries = body["output"]["completeTrackResults"]
        .as_array()
        .unwrap_or(&empty);

    requested
        .iter()
        .map(|number| {
            match entries
                .iter()
                .find(|entry| entry["trackingNumber"].as_str() == Some(number))
            {
                Some(entry) => parse_single(entry, number),
                None => TrackingResult::error(
                    *number,
                    Carrier::Fedex,
                    "tracking number not found in FedEx response",
                ),
            }
        })
        .collect()
}

/// Normalize one `completeTrackResults` entry. Never fails: a record
/// with no usable track results degrades to an error result.
fn parse_single(entry: &Value, tracking_number: &str) -> TrackingResult {
    let Some(info) = entry["trackResults"].as_array().and_then(|a| a.first()) else {
        return TrackingResult::error(tracking_number, Carrier::Fedex, "no tracking results found");
    };

    let status_description = info["latestStatusDetail"]["description"]
        .as_str()
        .unwrap_or("");
    let mut result = TrackingResult::new(
        tracking_number,
        Carrier::Fedex,
        map_status(status_description),
    );

    let delivery = &info["deliveryDetails"];
    result.delivery_address = delivery["deliveryLocation"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    result.estimated_delivery = delivery["estimatedDeliveryTimeWindow"]["window"]["ends"]
        .as_str()
        .and_then(parse_iso_naive);

    result.events = parse_events(&info["scanEvents"]);
    sort_events_chronological(&mut result.events);

    result.service_type = info["serviceDetail"]["description"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let package = &info["packageDetails"];
    if let (Some(value), Some(unit)) = (
        scalar_to_string(&package["weight"]["value"]),
        scalar_to_string(&package["weight"]["unit"]),
    ) {
        result.weight = Some(format!("{value} {unit}"));
    }
    if let (Some(length), Some(width), Some(height)) = (
        scalar_to_string(&package["dimensions"]["length"]),
        scalar_to_string(&package["dimensions"]["width"]),
        scalar_to_string(&package["dimensions"]["height"]),
    ) {
        let units = scalar_to_string(&package["dimensions"]["units"]).unwrap_or_default();
        result.dimensions = Some(format!("{length}x{width}x{height} {units}").trim().to_string());
    }

    result
}

/// Scan events with an unparseable date or empty description are
/// dropped individually; the rest of the result is unaffected.
fn parse_events(scan_events: &Value) -> Vec<TrackingEvent> {
    let Some(events) = scan_events.as_array() else {
        return Vec::new();
    };

    events
        .iter()
        .filter_map(|event| {
            let timestamp = event["date"].as_str().and_then(parse_iso_naive)?;
            let description = event["eventDescription"].as_str().filter(|d| !d.is_empty())?;

            let scan = &event["scanLocation"];
            let location = PackageLocation {
                city: scan["city"].as_str().map(str::to_string),
                state: scan["stateOrProvinceCode"].as_str().map(str::to_string),
                country: scan["countryCode"].as_str().map(str::to_string),
                postal_code: scan["postalCode"].as_str().map(str::to_string),
            };

            Some(TrackingEvent {
                timestamp,
                description: description.to_string(),
                location: (!location.is_empty()).then_some(location),
                status_code: event["eventType"]
                    .as_str()
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            })
        })
        .collect()
}
