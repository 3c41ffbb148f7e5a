//! UPS package tracking
//!
//! UPS has no bulk tracking endpoint, so batches become sequential
//! individual GETs to `/api/track/v1/details/{number}`, each failure
//! isolated into an error result. Auth is OAuth client-credentials with
//! HTTP Basic authorization at the token endpoint, and every tracking
//! request carries a fresh `transId` plus `transactionSrc` header as the
//! API mandates.

use std::sync::{Arc, LazyLock};

use carrier_auth::{CarrierAuth, ClientCredentials, TokenEndpoint, TokenManager};
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

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

/// Conservative per-batch cap; UPS is tracked one number at a time.
pub const MAX_BATCH_SIZE: usize = 10;

/// 1Z numbers, 12/18-digit references, Mail Innovations, InfoNotice.
static FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(1Z[0-9A-Z]{16}|[0-9]{12}|[0-9]{18}|[0-9]{22,25}|T[0-9]{10})$")
        .expect("static pattern")
});

/// Pure format check; accepts incidental spacing and punctuation.
pub fn validate_format(tracking_number: &str) -> bool {
    let clean = clean_tracking_number(tracking_number);
    !clean.is_empty() && FORMAT.is_match(&clean)
}

/// Keyword precedence for `currentStatus.description`.
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
        terms: &["in transit", "departed", "arrived", "origin scan"],
        status: TrackingStatus::InTransit,
    },
    StatusRule {
        terms: &["exception", "delayed", "weather", "unable", "returned"],
        status: TrackingStatus::Exception,
    },
    StatusRule {
        terms: &["order processed"],
        status: TrackingStatus::Pending,
    },
];

fn map_status(description: &str) -> TrackingStatus {
    if description.is_empty() {
        return TrackingStatus::Pending;
    }
    match_status(description, STATUS_RULES).unwrap_or(TrackingStatus::InTransit)
}

pub struct UpsTracker {
    auth: CarrierAuth,
    executor: ResilientExecutor,
    details_url: String,
}

impl UpsTracker {
    pub fn new(config: &OauthConfig, shared: &SharedConfig, client: reqwest::Client) -> Self {
        let base = constants::ups_base_url(config.sandbox);
        let endpoint = TokenEndpoint::new(
            format!("{base}{}", constants::UPS_TOKEN_PATH),
            ClientCredentials::Basic {
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
                Carrier::Ups,
                shared.request_timeout,
                shared.max_retries,
            ),
            details_url: format!("{base}/api/track/v1/details"),
        }
    }

    async fn track_inner(&self, tracking_number: &str) -> Result<TrackingResult> {
        if !validate_format(tracking_number) {
            return Err(TrackingError::InvalidTrackingNumber {
                carrier: Carrier::Ups,
                tracking_number: tracking_number.to_string(),
            });
        }

        let url = format!("{}/{tracking_number}", self.details_url);
        info!(tracking_number, "tracking UPS package");

        let response = send_authorized(Carrier::Ups, &self.executor, &self.auth, || {
            RequestSpec::get(url.clone())
                .query("locale", "en_US")
                .query("returnSignature", "false")
                .query("returnMilestones", "false")
                .query("returnPOD", "false")
                .header("transId", Uuid::new_v4().to_string())
                .header("transactionSrc", "tracking")
        })
        .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(TrackingResult::not_found(
                tracking_number,
                Carrier::Ups,
                "Tracking number not found",
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackingError::Request {
                carrier: Carrier::Ups,
                message: format!("tracking request failed: HTTP {} - {body}", status.as_u16()),
            });
        }

        let body = read_json(Carrier::Ups, response).await?;
        Ok(parse_tracking_response(&body, tracking_number))
    }
}

impl CarrierTracker for UpsTracker {
    fn carrier(&self) -> Carrier {
        Carrier::Ups
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
            check_batch(Carrier::Ups, tracking_numbers, MAX_BATCH_SIZE)?;

            // No native batch endpoint: sequential individual requests,
            // each failure isolated so one number never sinks the rest.
            let mut results = Vec::with_capacity(tracking_numbers.len());
            for number in tracking_numbers {
                match self.track_inner(number).await {
                    Ok(result) => results.push(result),
                    Err(err) => {
                        warn!(tracking_number = %number, error = %err, "UPS tracking failed");
                        results.push(TrackingResult::error(
                            number,
                            Carrier::Ups,
                            format!("tracking failed: {err}"),
                        ));
                    }
                }
            }
            Ok(results)
        })
    }
}

/// Normalize one UPS details response. Never fails: missing shipment or
/// package records degrade to error results.
fn parse_tracking_response(body: &Value, tracking_number: &str) -> TrackingResult {
    let Some(shipment) = body["trackResponse"]["shipment"]
        .as_array()
        .and_then(|a| a.first())
    else {
        return TrackingResult::error(tracking_number, Carrier::Ups, "no shipment data found");
    };

    let Some(package) = shipment["package"].as_array().and_then(|a| a.first()) else {
        return TrackingResult::error(tracking_number, Carrier::Ups, "no package data found");
    };

    let status_description = package["currentStatus"]["description"].as_str().unwrap_or("");
    let mut result = TrackingResult::new(
        tracking_number,
        Carrier::Ups,
        map_status(status_description),
    );

    // deliveryDate entries carry YYYYMMDD dates
    result.estimated_delivery = package["deliveryDate"]
        .as_array()
        .and_then(|a| a.first())
        .and_then(|d| d["date"].as_str())
        .and_then(|d| parse_date_midnight(d, "%Y%m%d"));

    result.delivery_address = package["deliveryInformation"]["location"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    result.events = parse_events(&package["activity"]);
    sort_events_chronological(&mut result.events);

    result.service_type = shipment["service"]["description"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if let (Some(weight), Some(unit)) = (
        scalar_to_string(&package["packageWeight"]["weight"]),
        scalar_to_string(&package["packageWeight"]["unitOfMeasurement"]["description"]),
    ) {
        result.weight = Some(format!("{weight} {unit}"));
    }

    result
}

/// UPS activity timestamps split across YYYYMMDD date and HHMMSS time
/// fields. Activities with unparseable timestamps or empty descriptions
/// are dropped individually.
fn parse_events(activities: &Value) -> Vec<TrackingEvent> {
    let Some(activities) = activities.as_array() else {
        return Vec::new();
    };

    activities
        .iter()
        .filter_map(|activity| {
            let date = activity["date"].as_str()?;
            let time = activity["time"].as_str()?;
            let timestamp = chrono::NaiveDateTime::parse_from_str(
                &format!("{date}{time}"),
                "%Y%m%d%H%M%S",
            )
            .ok()?;

            let description = activity["status"]["description"]
                .as_str()
                .filter(|d| !d.is_empty())?;

            let address = &activity["location"]["address"];
            let location = PackageLocation {
                city: address["city"].as_str().map(str::to_string),
                state: address["stateProvinceCode"].as_str().map(str::to_string),
                country: address["countryCode"].as_str().map(str::to_string),
                postal_code: address["postalCode"].as_str().map(str::to_string),
            };

            Some(TrackingEvent {
                timestamp,
                description: description.to_string(),
                location: (!location.is_empty()).then_some(location),
                status_code: activity["status"]["type"]
                    .as_str()
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn activity(date: &str, time: &str, description: &str) -> Value {
        json!({
            "date": date,
            "time": time,
            "status": {"description": description, "type": "I"},
            "location": {"address": {
                "city": "Louisville", "stateProvinceCode": "KY", "countryCode": "US"
            }}
        })
    }

    fn shipment_body(status_description: &str, activities: Value) -> Value {
        json!({"trackResponse": {"shipment": [{
            "service": {"description": "UPS Ground"},
            "package": [{
                "currentStatus": {"description": status_description, "code": "017"},
                "deliveryDate": [{"type": "SDD", "date": "20240305"}],
                "deliveryInformation": {"location": "Porch"},
                "activity": activities,
                "packageWeight": {
                    "weight": "5.0",
                    "unitOfMeasurement": {"description": "LBS"}
                }
            }]
        }]}})
    }

    #[test]
    fn format_accepts_ups_shapes() {
        assert!(validate_format("1Z999AA10123456784"));
        assert!(validate_format("1z 999 aa1 0123 4567 84"));
        assert!(validate_format("123456789012"));
        assert!(validate_format("123456789012345678"));
        assert!(validate_format("1234567890123456789012"));
        assert!(validate_format("T1234567890"));
    }

    #[test]
    fn format_rejects_everything_else() {
        assert!(!validate_format(""));
        assert!(!validate_format("1Z12345"));
        assert!(!validate_format("1Y999AA10123456784"));
        assert!(!validate_format("T123"));
    }

    #[test]
    fn status_mapping_follows_rule_order() {
        assert_eq!(map_status("Delivered"), TrackingStatus::Delivered);
        assert_eq!(map_status("Out For Delivery Today"), TrackingStatus::OutForDelivery);
        assert_eq!(map_status("Origin Scan"), TrackingStatus::InTransit);
        assert_eq!(map_status("Returned to sender"), TrackingStatus::Exception);
        assert_eq!(map_status("Order Processed: Ready for UPS"), TrackingStatus::Pending);
        assert_eq!(map_status(""), TrackingStatus::Pending);
        assert_eq!(map_status("On the way"), TrackingStatus::InTransit);
    }

    #[test]
    fn parse_populates_fields_and_sorts_events() {
        let body = shipment_body(
            "In Transit",
            json!([
                activity("20240303", "101500", "Arrived at facility"),
                activity("20240301", "080000", "Origin scan"),
            ]),
        );
        let result = parse_tracking_response(&body, "1Z999AA10123456784");

        assert_eq!(result.status, TrackingStatus::InTransit);
        assert_eq!(result.service_type.as_deref(), Some("UPS Ground"));
        assert_eq!(result.weight.as_deref(), Some("5.0 LBS"));
        assert_eq!(result.delivery_address.as_deref(), Some("Porch"));
        assert_eq!(
            result.estimated_delivery.unwrap().to_string(),
            "2024-03-05 00:00:00"
        );
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.events[0].description, "Origin scan");
        assert_eq!(result.events[1].description, "Arrived at facility");
    }

    #[test]
    fn unparseable_activity_timestamps_drop_that_event() {
        let body = shipment_body(
            "In Transit",
            json!([
                activity("20240301", "080000", "Origin scan"),
                activity("2024-03-02", "08:00:00", "Wrong format"),
            ]),
        );
        let result = parse_tracking_response(&body, "1Z999AA10123456784");
        assert_eq!(result.events.len(), 1);
    }

    #[test]
    fn missing_shipment_and_package_degrade_to_error_results() {
        let empty = json!({"trackResponse": {"shipment": []}});
        let result = parse_tracking_response(&empty, "1Z999AA10123456784");
        assert_eq!(result.status, TrackingStatus::Error);
        assert_eq!(result.error_message.as_deref(), Some("no shipment data found"));

        let no_package = json!({"trackResponse": {"shipment": [{"package": []}]}});
        let result = parse_tracking_response(&no_package, "1Z999AA10123456784");
        assert_eq!(result.error_message.as_deref(), Some("no package data found"));
    }

    // --- facade tests against a mocked carrier ---

    fn test_tracker(server_uri: &str) -> UpsTracker {
        let endpoint = TokenEndpoint::new(
            format!("{server_uri}/security/v1/oauth/token"),
            ClientCredentials::Basic {
                client_id: "cid".into(),
                client_secret: common::Secret::new("cs".into()),
            },
        );
        let client = reqwest::Client::new();
        let manager = TokenManager::new(
            endpoint,
            client.clone(),
            Duration::from_secs(5),
            Duration::from_secs(60),
        );
        UpsTracker {
            auth: CarrierAuth::Bearer(Arc::new(manager)),
            executor: ResilientExecutor::new(client, Carrier::Ups, Duration::from_secs(5), 1),
            details_url: format!("{server_uri}/api/track/v1/details"),
        }
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/security/v1/oauth/token"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "expires_in": "14399"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn track_sends_required_headers_and_params() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/track/v1/details/1Z999AA10123456784"))
            .and(query_param("locale", "en_US"))
            .and(query_param("returnSignature", "false"))
            .and(header_exists("transid"))
            .and(header_exists("transactionsrc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(shipment_body("Delivered", json!([]))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tracker = test_tracker(&server.uri());
        let result = tracker.track("1Z999AA10123456784").await.unwrap();
        assert_eq!(result.status, TrackingStatus::Delivered);
    }

    #[tokio::test]
    async fn not_found_maps_to_not_found_result() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tracker = test_tracker(&server.uri());
        let result = tracker.track("1Z999AA10123456784").await.unwrap();
        assert_eq!(result.status, TrackingStatus::NotFound);
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn batch_results_match_input_order_with_isolation() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/track/v1/details/1Z999AA10123456784"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(shipment_body("In Transit", json!([]))),
            )
            .mount(&server)
            .await;
        // Second number: carrier 500s; executor (1 retry) returns it,
        // tracker converts to an isolated error result
        Mock::given(method("GET"))
            .and(path("/api/track/v1/details/123456789012"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tracker = test_tracker(&server.uri());
        let numbers = vec![
            "1Z999AA10123456784".to_string(),
            "123456789012".to_string(),
        ];
        let results = tracker.track_batch(&numbers).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tracking_number, numbers[0]);
        assert_eq!(results[0].status, TrackingStatus::InTransit);
        assert_eq!(results[1].tracking_number, numbers[1]);
        assert_eq!(results[1].status, TrackingStatus::Error);
    }
}
