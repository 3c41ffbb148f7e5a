//! HTTP error mapping for the tracking API
//!
//! Tracking failures that normalize into error results ship as 200s
//! with the result body; only structural problems surface here:
//! format/batch violations as 400, missing carrier config as 503,
//! exhausted rate limits as 429, upstream auth/transport trouble as 502.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracking_core::TrackingError;

/// Wrapper carrying a `TrackingError` out of a handler.
pub struct ApiError(pub TrackingError);

impl From<TrackingError> for ApiError {
    fn from(err: TrackingError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            TrackingError::InvalidTrackingNumber { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_tracking_number")
            }
            TrackingError::InvalidBatch { .. } => (StatusCode::BAD_REQUEST, "invalid_batch"),
            TrackingError::NotConfigured { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "carrier_not_configured")
            }
            TrackingError::RateLimit { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            TrackingError::Authentication { .. } => (StatusCode::BAD_GATEWAY, "authentication"),
            TrackingError::Request { .. } => (StatusCode::BAD_GATEWAY, "carrier_request"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let body = serde_json::json!({
            "error": {
                "type": error_type,
                "carrier": self.0.carrier(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
