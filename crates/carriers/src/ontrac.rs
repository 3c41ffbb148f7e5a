//! OnTrac package tracking
//!
//! OnTrac is the odd one out three times over: auth is a static API key
//! injected as the `pw` query parameter (no token endpoint, nothing to
//! refresh), the payload is XML rather than JSON, and there is no batch
//! endpoint at all, so the batch capability is 1 and fan-out happens as
//! concurrent individual requests. Tracking numbers are normalized
//! (trim + upcase) before format validation, since the carrier treats
//! case and whitespace loosely.

use std::sync::LazyLock;

use carrier_auth::CarrierAuth;
use futures::future::join_all;
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use tracking_core::{
    BoxFuture, Carrier, CarrierTracker, PackageLocation, RequestSpec, ResilientExecutor, Result,
    TrackingError, TrackingEvent, TrackingResult, TrackingStatus, check_batch,
    sort_events_chronological,
};

use crate::config::{OntracConfig, SharedConfig};
use crate::constants;
use crate::support::{parse_iso_naive, send_authorized};
use crate::xml::{self, XmlNode};

/// OnTrac has no batch endpoint.
pub const MAX_BATCH_SIZE: usize = 1;

/// C or D followed by 14 digits.
static FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[CD]\d{14}$").expect("static pattern"));

/// Pure format check after trim + upcase normalization.
pub fn validate_format(tracking_number: &str) -> bool {
    FORMAT.is_match(&normalize(tracking_number))
}

fn normalize(tracking_number: &str) -> String {
    tracking_number.trim().to_uppercase()
}

/// OnTrac status codes, checked against the most recent event before
/// falling back to description keywords.
const DELIVERED_CODES: &[&str] = &["CL", "DW", "OK", "DN"];
const OUT_FOR_DELIVERY_CODES: &[&str] = &["OD"];
const EXCEPTION_CODES: &[&str] = &["CR", "DC", "DR", "UD", "UM", "RS"];
const LABEL_CREATED_CODES: &[&str] = &["XX", "OE"];

/// Status from the most recent event's code, then its description.
fn status_from_events(events: &[TrackingEvent]) -> TrackingStatus {
    let Some(latest) = events.last() else {
        return TrackingStatus::Unknown;
    };

    let code = latest
        .status_code
        .as_deref()
        .unwrap_or("")
        .to_uppercase();
    let description = latest.description.to_uppercase();

    if DELIVERED_CODES.contains(&code.as_str()) || description.contains("DELIVERED") {
        TrackingStatus::Delivered
    } else if OUT_FOR_DELIVERY_CODES.contains(&code.as_str())
        || description.contains("OUT FOR DELIVERY")
    {
        TrackingStatus::OutForDelivery
    } else if EXCEPTION_CODES.contains(&code.as_str())
        || ["EXCEPTION", "RETURN", "REFUSED", "DAMAGE"]
            .iter()
            .any(|term| description.contains(term))
    {
        TrackingStatus::Exception
    } else if LABEL_CREATED_CODES.contains(&code.as_str()) || description.contains("DATA ENTRY") {
        TrackingStatus::LabelCreated
    } else {
        // Scan codes OS/PS/RD/PU and anything unrecognized
        TrackingStatus::InTransit
    }
}

pub struct OntracTracker {
    auth: CarrierAuth,
    executor: ResilientExecutor,
    shipments_url: String,
}

impl OntracTracker {
    pub fn new(config: &OntracConfig, shared: &SharedConfig, client: reqwest::Client) -> Self {
        let base = constants::ontrac_base_url(config.sandbox);
        Self {
            auth: CarrierAuth::StaticKey {
                key: config.api_key.clone(),
                param: "pw",
            },
            executor: ResilientExecutor::new(
                client,
                Carrier::Ontrac,
                shared.request_timeout,
                shared.max_retries,
            ),
            shipments_url: format!("{base}/V7/{}/shipments", config.account_number),
        }
    }

    async fn track_inner(&self, tracking_number: &str) -> Result<TrackingResult> {
        let normalized = normalize(tracking_number);
        if !FORMAT.is_match(&normalized) {
            return Err(TrackingError::InvalidTrackingNumber {
                carrier: Carrier::Ontrac,
                tracking_number: tracking_number.to_string(),
            });
        }

        info!(tracking_number = %normalized, "tracking OnTrac package");
        let response = send_authorized(Carrier::Ontrac, &self.executor, &self.auth, || {
            RequestSpec::get(self.shipments_url.clone())
                .query("tn", normalized.clone())
                .query("requestType", "track")
                .header("Accept", "application/xml")
                .header("User-Agent", constants::USER_AGENT)
        })
        .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(TrackingResult::error(
                &normalized,
                Carrier::Ontrac,
                format!("Tracking number not found: {normalized}"),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackingError::Request {
                carrier: Carrier::Ontrac,
                message: format!("tracking request failed: HTTP {} - {body}", status.as_u16()),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TrackingError::Request {
                carrier: Carrier::Ontrac,
                message: format!("failed to read response body: {e}"),
            })?;
        Ok(parse_xml_response(&body, &normalized))
    }
}

impl CarrierTracker for OntracTracker {
    fn carrier(&self) -> Carrier {
        Carrier::Ontrac
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
            check_batch(Carrier::Ontrac, tracking_numbers, MAX_BATCH_SIZE)?;

            // Concurrent fan-out; join_all keeps input order regardless
            // of completion order
            let calls = tracking_numbers.iter().map(|n| self.track_inner(n));
            let outcomes = join_all(calls).await;

            Ok(tracking_numbers
                .iter()
                .zip(outcomes)
                .map(|(number, outcome)| {
                    outcome.unwrap_or_else(|err| {
                        warn!(tracking_number = %number, error = %err, "OnTrac tracking failed");
                        TrackingResult::error(number, Carrier::Ontrac, err.to_string())
                    })
                })
                .collect())
        })
    }
}

/// Normalize the OnTrac XML payload. Never fails: parse errors and
/// API-reported errors degrade to error results carrying the message.
fn parse_xml_response(xml_text: &str, tracking_number: &str) -> TrackingResult {
    let document = match xml::parse(xml_text) {
        Ok(document) => document,
        Err(err) => {
            return TrackingResult::error(
                tracking_number,
                Carrier::Ontrac,
                format!("invalid XML response from OnTrac API: {err}"),
            );
        }
    };

    // The service reports failures inside the envelope
    if let Some(error) = document.descendant("Error") {
        let text = error.text.trim();
        if !text.is_empty() {
            return TrackingResult::error(
                tracking_number,
                Carrier::Ontrac,
                format!("OnTrac API error: {text}"),
            );
        }
    }

    let Some(shipment) = document.descendant("Shipment") else {
        return TrackingResult::error(
            tracking_number,
            Carrier::Ontrac,
            "no shipment data found in OnTrac response",
        );
    };

    let mut events: Vec<TrackingEvent> = shipment
        .child("Events")
        .map(|container| {
            container
                .children_named("Event")
                .filter_map(parse_event)
                .collect()
        })
        .unwrap_or_default();
    sort_events_chronological(&mut events);

    let delivered = shipment
        .child_text("Delivered")
        .is_some_and(|t| t.eq_ignore_ascii_case("true"));
    let status = if delivered {
        TrackingStatus::Delivered
    } else {
        status_from_events(&events)
    };

    let mut result = TrackingResult::new(tracking_number, Carrier::Ontrac, status);
    result.delivered_at = delivered
        .then(|| events.last().map(|e| e.timestamp))
        .flatten();
    result.estimated_delivery = shipment.child_text("Exp_Del_Date").and_then(parse_iso_naive);

    let destination = PackageLocation {
        city: shipment.child_text("City").map(str::to_string),
        state: shipment.child_text("State").map(str::to_string),
        country: Some("US".to_string()),
        postal_code: shipment.child_text("Zip").map(str::to_string),
    };
    result.destination = Some(destination);

    // Service codes map to marketing names; unknown codes pass through
    result.service_type = Some(match shipment.child_text("Service") {
        Some("C") | None => "OnTrac Ground".to_string(),
        Some(other) => other.to_string(),
    });

    result.weight = shipment.child_text("Weight").map(str::to_string);

    for name in ["Reference", "Reference2"] {
        if let Some(reference) = shipment.child_text(name) {
            result.reference_numbers.push(reference.to_string());
        }
    }

    result.events = events;
    result.raw_payload = Some(json!({"xml": xml_text}));
    result
}

/// One `<Event>` element; events missing a parseable `EventTime` or a
/// description are dropped.
fn parse_event(element: &XmlNode) -> Option<TrackingEvent> {
    // Timestamps look like 2022-04-06T14:53:21.45, occasionally with a Z
    let timestamp = parse_iso_naive(element.child_text("EventTime")?)?;
    let description = element.child_text("Description")?;

    let city = element.child_text("City");
    let state = element.child_text("State");
    let zip = element.child_text("Zip");
    let location = (city.is_some() || state.is_some() || zip.is_some()).then(|| PackageLocation {
        city: city.map(str::to_string),
        state: state.map(str::to_string),
        country: Some("US".to_string()),
        postal_code: zip.map(str::to_string),
    });

    Some(TrackingEvent {
        timestamp,
        description: description.to_string(),
        location,
        status_code: element.child_text("Status").map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event_xml(time: &str, status: &str, description: &str) -> String {
        format!(
            "<Event><EventTime>{time}</EventTime><Status>{status}</Status>\
             <Description>{description}</Description>\
             <City>Chandler</City><State>AZ</State><Zip>85226</Zip></Event>"
        )
    }

    fn shipment_xml(delivered: &str, events: &str) -> String {
        format!(
            "<TrackingShipmentList><Shipment>\
             <Tracking>C10000000000001</Tracking>\
             <Delivered>{delivered}</Delivered>\
             <Exp_Del_Date>2022-04-08T00:00:00</Exp_Del_Date>\
             <Service>C</Service><Weight>3.5</Weight>\
             <City>Phoenix</City><State>AZ</State><Zip>85001</Zip>\
             <Reference>PO-1234</Reference>\
             <Events>{events}</Events>\
             </Shipment></TrackingShipmentList>"
        )
    }

    #[test]
    fn format_normalizes_case_and_whitespace() {
        assert!(validate_format("C10000000000001"));
        assert!(validate_format("  c10000000000001  "));
        assert!(validate_format("D10000000000001"));
        assert!(!validate_format("E10000000000001"));
        assert!(!validate_format("C1000000000001"));
        assert!(!validate_format(""));
    }

    #[test]
    fn status_codes_take_precedence() {
        let make = |code: &str, description: &str| {
            vec![TrackingEvent {
                timestamp: chrono::NaiveDate::from_ymd_opt(2022, 4, 6)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap(),
                description: description.into(),
                location: None,
                status_code: Some(code.into()),
            }]
        };

        assert_eq!(status_from_events(&make("OK", "x")), TrackingStatus::Delivered);
        assert_eq!(status_from_events(&make("OD", "x")), TrackingStatus::OutForDelivery);
        assert_eq!(status_from_events(&make("RS", "x")), TrackingStatus::Exception);
        assert_eq!(status_from_events(&make("XX", "x")), TrackingStatus::LabelCreated);
        assert_eq!(status_from_events(&make("OS", "x")), TrackingStatus::InTransit);
        // Unknown code falls back to description, then to in-transit
        assert_eq!(
            status_from_events(&make("ZZ", "Package refused")),
            TrackingStatus::Exception
        );
        assert_eq!(status_from_events(&make("ZZ", "moving")), TrackingStatus::InTransit);
        assert_eq!(status_from_events(&[]), TrackingStatus::Unknown);
    }

    #[test]
    fn parse_orders_events_and_extracts_shipment_fields() {
        let xml = shipment_xml(
            "false",
            &(event_xml("2022-04-06T14:53:21.45", "OS", "Package received") +
              &event_xml("2022-04-05T09:00:00", "XX", "Data entry")),
        );
        let result = parse_xml_response(&xml, "C10000000000001");

        assert_eq!(result.status, TrackingStatus::InTransit);
        assert_eq!(result.events.len(), 2);
        // Ascending order regardless of document order
        assert_eq!(result.events[0].description, "Data entry");
        assert_eq!(result.events[1].description, "Package received");
        assert_eq!(result.service_type.as_deref(), Some("OnTrac Ground"));
        assert_eq!(result.weight.as_deref(), Some("3.5"));
        assert_eq!(result.reference_numbers, vec!["PO-1234".to_string()]);
        let destination = result.destination.as_ref().unwrap();
        assert_eq!(destination.city.as_deref(), Some("Phoenix"));
        assert_eq!(destination.postal_code.as_deref(), Some("85001"));
        assert!(result.estimated_delivery.is_some());
        assert!(result.raw_payload.is_some());
    }

    #[test]
    fn delivered_flag_forces_delivered_and_sets_timestamp() {
        let xml = shipment_xml(
            "true",
            &event_xml("2022-04-06T14:53:21.45", "DW", "Delivered to front door"),
        );
        let result = parse_xml_response(&xml, "C10000000000001");
        assert_eq!(result.status, TrackingStatus::Delivered);
        assert_eq!(
            result.delivered_at.unwrap().date().to_string(),
            "2022-04-06"
        );
    }

    #[test]
    fn api_error_element_degrades_to_error_result() {
        let xml = "<TrackingShipmentList><Error>Invalid account</Error></TrackingShipmentList>";
        let result = parse_xml_response(xml, "C10000000000001");
        assert_eq!(result.status, TrackingStatus::Error);
        assert!(
            result
                .error_message
                .as_deref()
                .unwrap()
                .contains("Invalid account")
        );
    }

    #[test]
    fn unparseable_xml_degrades_to_error_result() {
        let result = parse_xml_response("<not-xml", "C10000000000001");
        assert_eq!(result.status, TrackingStatus::Error);
        assert!(result.events.is_empty());
    }

    #[test]
    fn events_without_time_or_description_are_dropped() {
        let xml = shipment_xml(
            "false",
            "<Event><Status>OS</Status><Description>No time</Description></Event>\
             <Event><EventTime>2022-04-06T10:00:00</EventTime><Status>OS</Status></Event>\
             <Event><EventTime>2022-04-06T11:00:00</EventTime><Status>OS</Status>\
             <Description>Kept</Description></Event>",
        );
        let result = parse_xml_response(&xml, "C10000000000001");
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].description, "Kept");
    }

    // --- facade tests against a mocked carrier ---

    fn test_tracker(server_uri: &str) -> OntracTracker {
        OntracTracker {
            auth: CarrierAuth::StaticKey {
                key: common::Secret::new("api-key".into()),
                param: "pw",
            },
            executor: ResilientExecutor::new(
                reqwest::Client::new(),
                Carrier::Ontrac,
                Duration::from_secs(5),
                1,
            ),
            shipments_url: format!("{server_uri}/V7/37/shipments"),
        }
    }

    #[tokio::test]
    async fn track_injects_key_as_query_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/V7/37/shipments"))
            .and(query_param("pw", "api-key"))
            .and(query_param("tn", "C10000000000001"))
            .and(query_param("requestType", "track"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(shipment_xml("false", "")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tracker = test_tracker(&server.uri());
        // Lowercase input is normalized before validation and sending
        let result = tracker.track("c10000000000001").await.unwrap();
        assert_eq!(result.tracking_number, "C10000000000001");
        assert_eq!(result.status, TrackingStatus::Unknown);
    }

    #[tokio::test]
    async fn unauthorized_static_key_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = test_tracker(&server.uri());
        let err = tracker.track("C10000000000001").await.unwrap_err();
        assert!(
            matches!(err, TrackingError::Authentication { status: Some(401), .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn batch_over_capability_rejects_before_io() {
        let server = MockServer::start().await;
        let tracker = test_tracker(&server.uri());
        let numbers = vec!["C10000000000001".to_string(), "C10000000000002".to_string()];
        let err = tracker.track_batch(&numbers).await.unwrap_err();
        assert!(err.to_string().contains("maximum allowed: 1"));
    }

    #[tokio::test]
    async fn single_member_batch_isolates_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tracker = test_tracker(&server.uri());
        let numbers = vec!["C10000000000001".to_string()];
        let results = tracker.track_batch(&numbers).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TrackingStatus::Error);
        assert!(results[0].error_message.is_some());
    }
}
