//! DHL eCommerce package tracking
//!
//! DHL supports native batches: up to 10 numbers travel as one
//! comma-joined `trackingId` query parameter, and the `packages` array
//! in the response is re-matched to the request list by tracking id.
//! Status comes from the most recent event description rather than a
//! dedicated status field. Auth is OAuth client-credentials with the
//! client id/secret in the form body.

use std::sync::{Arc, LazyLock};

use carrier_auth::{CarrierAuth, ClientCredentials, TokenEndpoint, TokenManager};
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use tracking_core::{
    BoxFuture, Carrier, CarrierTracker, PackageLocation, RequestSpec, ResilientExecutor, Result,
    StatusRule, TrackingError, TrackingEvent, TrackingResult, TrackingStatus, check_batch,
    match_status, sort_events_chronological,
};

use crate::config::{OauthConfig, SharedConfig};
use crate::constants;
use crate::support::{
    clean_tracking_number, parse_date_midnight, read_json, scalar_to_string, send_authorized,
};

/// DHL accepts up to 10 tracking ids per request.
pub const MAX_BATCH_SIZE: usize = 10;

/// Express (two letters + 9 digits + two letters), eCommerce numerics,
/// alphanumeric package ids, GM prefix, USPS-routed 420 barcodes.
static FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{2}[0-9]{9}[A-Z]{2}|[0-9]{10,30}|[A-Z0-9]{10,30}|GM[0-9]{17}|420[0-9]{27})$")
        .expect("static pattern")
});

/// Pure format check. DHL numbers run 10-30 characters after cleanup.
pub fn validate_format(tracking_number: &str) -> bool {
    let clean = clean_tracking_number(tracking_number);
    if clean.len() < 10 || clean.len() > 30 {
        return false;
    }
    FORMAT.is_match(&clean)
}

/// Keyword precedence for the most recent event description.
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
        terms: &["processed", "departed", "arrived", "in transit"],
        status: TrackingStatus::InTransit,
    },
    StatusRule {
        terms: &["exception", "delayed", "returned", "unable"],
        status: TrackingStatus::Exception,
    },
];

/// Status from the most recent event; packages with no scans yet are
/// pending.
fn status_from_events(events: &[TrackingEvent]) -> TrackingStatus {
    match events.last() {
        None => TrackingStatus::Pending,
        Some(latest) => {
            match_status(&latest.description, STATUS_RULES).unwrap_or(TrackingStatus::InTransit)
        }
    }
}

pub struct DhlTracker {
    auth: CarrierAuth,
    executor: ResilientExecutor,
    api_url: String,
}

impl DhlTracker {
    pub fn new(config: &OauthConfig, shared: &SharedConfig, client: reqwest::Client) -> Self {
        let base = constants::dhl_base_url(config.sandbox);
        let endpoint = TokenEndpoint::new(
            format!("{base}{}", constants::DHL_TOKEN_PATH),
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
                Carrier::Dhl,
                shared.request_timeout,
                shared.max_retries,
            ),
            api_url: format!("{base}/tracking/v4/package/open"),
        }
    }

    fn spec_for(&self, tracking_ids: &str, limit: usize) -> RequestSpec {
        RequestSpec::get(self.api_url.clone())
            .query("trackingId", tracking_ids)
            .query("limit", limit.to_string())
            .header("User-Agent", constants::USER_AGENT)
    }

    async fn track_inner(&self, tracking_number: &str) -> Result<TrackingResult> {
        if !validate_format(tracking_number) {
            return Err(TrackingError::InvalidTrackingNumber {
                carrier: Carrier::Dhl,
                tracking_number: tracking_number.to_string(),
            });
        }

        info!(tracking_number, "tracking DHL package");
        let response = send_authorized(Carrier::Dhl, &self.executor, &self.auth, || {
            self.spec_for(tracking_number, 1)
        })
        .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(TrackingResult::not_found(
                tracking_number,
                Carrier::Dhl,
                "Tracking number not found",
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackingError::Request {
                carrier: Carrier::Dhl,
                message: format!("tracking request failed: HTTP {} - {body}", status.as_u16()),
            });
        }

        let body = read_json(Carrier::Dhl, response).await?;
        Ok(parse_first_package(&body, tracking_number))
    }

    /// One comma-joined GET for the given (pre-validated) numbers.
    async fn request_batch(&self, numbers: &[&str]) -> Result<Vec<TrackingResult>> {
        let joined = numbers.join(",");
        let limit = numbers.len().min(MAX_BATCH_SIZE);

        info!(count = numbers.len(), "tracking DHL packages");
        let response = send_authorized(Carrier::Dhl, &self.executor, &self.auth, || {
            self.spec_for(&joined, limit)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackingError::Request {
                carrier: Carrier::Dhl,
                message: format!("tracking request failed: HTTP {} - {body}", status.as_u16()),
            });
        }

        let body = read_json(Carrier::Dhl, response).await?;
        Ok(parse_batch_response(&body, numbers))
    }
}

impl CarrierTracker for DhlTracker {
    fn carrier(&self) -> Carrier {
        Carrier::Dhl
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    fn validate_format(&self, tracking_number: &str) -> bool {
        validate_format(tracking_number)
    }

    fn track<'a>(&'a self, tracking_number: &'a str) -> BoxFuture<'a, Result<TrackingResult>> {
        Box::pin(self.track_inner(tracking_number))
    }

    fn track_batch<'a>(
        &'a self,
        tracking_numbers: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<TrackingResult>>> {
        Box::pin(async move {
            check_batch(Carrier::Dhl, tracking_numbers, MAX_BATCH_SIZE)?;

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
                        warn!(error = %err, "DHL batch request failed");
                        let message = format!("tracking failed: {err}");
                        valid
                            .iter()
                            .map(|n| TrackingResult::error(*n, Carrier::Dhl, message.clone()))
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
                                Carrier::Dhl,
                                "missing from carrier response",
                            )
                        })
                    } else {
                        TrackingResult::error(
                            number,
                            Carrier::Dhl,
                            TrackingError::InvalidTrackingNumber {
                                carrier: Carrier::Dhl,
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

/// Re-match `packages` entries to the requested ids; requested ids the
/// response omits synthesize "not found in response" results.
fn parse_batch_response(body: &Value, requested: &[&str]) -> Vec<TrackingResult> {
    let empty = Vec::new();
    let packages = body["packages"].as_array().unwrap_or(&empty);

    requested
        .iter()
        .map(|number| {
            match packages
                .iter()
                .find(|p| p["package"]["trackingId"].as_str() == Some(number))
            {
                Some(entry) => parse_package(entry, number),
                None => TrackingResult::error(
                    *number,
                    Carrier::Dhl,
                    "package not found in response",
                ),
            }
        })
        .collect()
}

/// Single-package lookup: normalize the first `packages` entry.
fn parse_first_package(body: &Value, tracking_number: &str) -> TrackingResult {
    match body["packages"].as_array().and_then(|a| a.first()) {
        Some(entry) => parse_package(entry, tracking_number),
        None => TrackingResult::error(tracking_number, Carrier::Dhl, "no package data found"),
    }
}

/// Normalize one `packages` entry. Never fails.
fn parse_package(entry: &Value, tracking_number: &str) -> TrackingResult {
    let package = &entry["package"];

    let mut events = parse_events(&entry["events"]);
    sort_events_chronological(&mut events);

    let mut result = TrackingResult::new(tracking_number, Carrier::Dhl, status_from_events(&events));
    result.events = events;

    result.estimated_delivery = package["expectedDelivery"]
        .as_str()
        .and_then(|d| parse_date_midnight(d, "%Y-%m-%d"));

    // Recipient city/state/zip/country join into a display address
    let recipient = &entry["recipient"];
    let destination = PackageLocation {
        city: recipient["city"].as_str().map(str::to_string),
        state: recipient["state"].as_str().map(str::to_string),
        country: recipient["country"].as_str().map(str::to_string),
        postal_code: recipient["postalCode"].as_str().map(str::to_string),
    };
    if !destination.is_empty() {
        result.delivery_address = Some(destination.to_string());
        result.destination = Some(destination);
    }

    result.service_type = package["productName"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if let (Some(value), Some(unit)) = (
        scalar_to_string(&package["weight"]["value"]),
        scalar_to_string(&package["weight"]["unitOfMeasure"]),
    ) {
        result.weight = Some(format!("{value} {unit}"));
    }

    result
}

/// DHL events split timestamps across `date` (YYYY-MM-DD) and `time`
/// (HH:MM:SS). The secondary description is preferred when present.
/// Events with unparseable timestamps or no description are dropped.
fn parse_events(events: &Value) -> Vec<TrackingEvent> {
    let Some(events) = events.as_array() else {
        return Vec::new();
    };

    events
        .iter()
        .filter_map(|event| {
            let date = event["date"].as_str()?;
            let time = event["time"].as_str()?;
            let timestamp = chrono::NaiveDateTime::parse_from_str(
                &format!("{date} {time}"),
                "%Y-%m-%d %H:%M:%S",
            )
            .ok()?;

            let primary = event["primaryEventDescription"].as_str().unwrap_or("");
            let secondary = event["secondaryEventDescription"].as_str().unwrap_or("");
            let description = if secondary.is_empty() { primary } else { secondary };
            if description.is_empty() {
                return None;
            }

            let location = event["location"]
                .as_str()
                .filter(|l| !l.is_empty())
                .map(parse_location);

            Some(TrackingEvent {
                timestamp,
                description: description.to_string(),
                location,
                status_code: (!primary.is_empty()).then(|| primary.to_string()),
            })
        })
        .collect()
}

/// DHL event locations arrive as one comma-joined display string
/// ("Compton, CA, US"); split it back into city/state/country parts.
fn parse_location(display: &str) -> PackageLocation {
    let mut parts = display.split(',').map(str::trim).filter(|p| !p.is_empty());
    PackageLocation {
        city: parts.next().map(str::to_string),
        state: parts.next().map(str::to_string),
        country: parts.next().map(str::to_string),
        postal_code: None,
    }
}
