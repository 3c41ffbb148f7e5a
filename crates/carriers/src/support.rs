//! Shared request plumbing and parsing helpers for carrier trackers

use carrier_auth::CarrierAuth;
use chrono::{NaiveDate, NaiveDateTime};
use tracking_core::{Carrier, RequestSpec, ResilientExecutor, Result, TrackingError};
use tracing::warn;

/// Convert an auth-layer error into the tracking taxonomy, keeping the
/// carrier context and the token endpoint's HTTP status.
pub(crate) fn auth_error(carrier: Carrier, err: carrier_auth::Error) -> TrackingError {
    TrackingError::Authentication {
        carrier,
        status: err.status(),
        message: err.to_string(),
    }
}

/// Decorate a request with the carrier's credentials: bearer header for
/// OAuth carriers, query-parameter injection for static keys.
pub(crate) async fn authorize(
    spec: RequestSpec,
    auth: &CarrierAuth,
    carrier: Carrier,
) -> Result<RequestSpec> {
    match auth {
        CarrierAuth::Bearer(manager) => {
            let token = manager
                .access_token()
                .await
                .map_err(|e| auth_error(carrier, e))?;
            Ok(spec.bearer(&token))
        }
        CarrierAuth::StaticKey { key, param } => Ok(spec.query(*param, key.expose_str())),
    }
}

/// Send an authorized request, handling 401 by invalidating the cached
/// credential and retrying the whole operation exactly once.
///
/// The second 401 (or any 401 on a static-key carrier, which has nothing
/// to refresh) is terminal. All other statuses are the caller's to
/// interpret.
pub(crate) async fn send_authorized<F>(
    carrier: Carrier,
    executor: &ResilientExecutor,
    auth: &CarrierAuth,
    build: F,
) -> Result<reqwest::Response>
where
    F: Fn() -> RequestSpec,
{
    let spec = authorize(build(), auth, carrier).await?;
    let response = executor.send(&spec).await?;
    if response.status().as_u16() != 401 {
        return Ok(response);
    }

    if !auth.supports_refresh() {
        return Err(TrackingError::Authentication {
            carrier,
            message: "carrier rejected the configured API key".into(),
            status: Some(401),
        });
    }

    warn!(%carrier, "received 401, invalidating credential and retrying once");
    auth.invalidate().await;
    let spec = authorize(build(), auth, carrier).await?;
    let response = executor.send(&spec).await?;
    if response.status().as_u16() == 401 {
        return Err(TrackingError::Authentication {
            carrier,
            message: "carrier rejected refreshed credential".into(),
            status: Some(401),
        });
    }
    Ok(response)
}

/// Read a JSON response body, mapping decode failures into the tracking
/// taxonomy.
pub(crate) async fn read_json(
    carrier: Carrier,
    response: reqwest::Response,
) -> Result<serde_json::Value> {
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| TrackingError::Request {
            carrier,
            message: format!("invalid JSON response: {e}"),
        })
}

/// Strip everything but ASCII alphanumerics and upcase. Carriers accept
/// tracking numbers with incidental spacing and punctuation.
pub(crate) fn clean_tracking_number(tracking_number: &str) -> String {
    tracking_number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Parse an ISO-8601 timestamp into naive carrier time. Inputs carrying
/// an offset or `Z` are reduced to their UTC wall-clock component;
/// fractional seconds are accepted.
pub(crate) fn parse_iso_naive(input: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(input.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Render a scalar JSON field (string or number) for display fields like
/// weight values; empty strings map to `None`.
pub(crate) fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a bare date in the given format to midnight.
pub(crate) fn parse_date_midnight(input: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(input, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_punctuation_and_upcases() {
        assert_eq!(clean_tracking_number(" 1z 999-aa1.0123456784 "), "1Z999AA10123456784");
        assert_eq!(clean_tracking_number(""), "");
    }

    #[test]
    fn iso_with_zone_reduces_to_naive_utc() {
        let parsed = parse_iso_naive("2024-03-01T10:00:00-06:00").unwrap();
        assert_eq!(parsed.to_string(), "2024-03-01 16:00:00");

        let zulu = parse_iso_naive("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(zulu.to_string(), "2024-03-01 10:00:00");
    }

    #[test]
    fn iso_without_zone_parses_fractional_seconds() {
        // OnTrac emits timestamps like 2022-04-06T14:53:21.45
        let parsed = parse_iso_naive("2022-04-06T14:53:21.45").unwrap();
        assert_eq!(parsed.date().to_string(), "2022-04-06");
    }

    #[test]
    fn garbage_timestamps_are_none() {
        assert!(parse_iso_naive("not a date").is_none());
        assert!(parse_date_midnight("2024-13-01", "%Y-%m-%d").is_none());
    }

    #[test]
    fn bare_dates_parse_to_midnight() {
        let ups = parse_date_midnight("20240301", "%Y%m%d").unwrap();
        assert_eq!(ups.to_string(), "2024-03-01 00:00:00");
        let dhl = parse_date_midnight("2024-03-01", "%Y-%m-%d").unwrap();
        assert_eq!(dhl.to_string(), "2024-03-01 00:00:00");
    }
}
