//! HTTP surface for the tracking core
//!
//! Three contracts, carrier-parameterized: `POST /v1/track`,
//! `POST /v1/track/batch`, `GET /v1/validate`. Batch responses always
//! hold one result per requested number in request order; per-package
//! failures arrive as error results inside a 200, never as an HTTP
//! error.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tracing::info;

use carriers::CarrierRegistry;
use tracking_core::{Carrier, TrackingResult};

use crate::error::ApiError;
use crate::metrics::record_track_request;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CarrierRegistry>,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// The concurrency limit layer enforces the configured maximum of
/// simultaneous requests.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/v1/track", post(track))
        .route("/v1/track/batch", post(track_batch))
        .route("/v1/validate", get(validate))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct TrackRequest {
    carrier: Carrier,
    tracking_number: String,
}

#[derive(Debug, Deserialize)]
struct TrackBatchRequest {
    carrier: Carrier,
    tracking_numbers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateParams {
    carrier: Carrier,
    tracking_number: String,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    carrier: Carrier,
    tracking_number: String,
    valid: bool,
}

async fn track(
    State(state): State<AppState>,
    Json(request): Json<TrackRequest>,
) -> Result<Json<TrackingResult>, ApiError> {
    let started = Instant::now();
    let outcome = state
        .registry
        .track(request.carrier, &request.tracking_number)
        .await;

    let label = if outcome.is_ok() { "ok" } else { "error" };
    record_track_request(
        request.carrier.as_str(),
        label,
        started.elapsed().as_secs_f64(),
    );

    let result = outcome?;
    info!(
        carrier = %request.carrier,
        tracking_number = %request.tracking_number,
        status = ?result.status,
        "tracked package"
    );
    Ok(Json(result))
}

async fn track_batch(
    State(state): State<AppState>,
    Json(request): Json<TrackBatchRequest>,
) -> Result<Json<Vec<TrackingResult>>, ApiError> {
    let started = Instant::now();
    let outcome = state
        .registry
        .track_batch(request.carrier, &request.tracking_numbers)
        .await;

    let label = if outcome.is_ok() { "ok" } else { "error" };
    record_track_request(
        request.carrier.as_str(),
        label,
        started.elapsed().as_secs_f64(),
    );

    let results = outcome?;
    info!(
        carrier = %request.carrier,
        requested = request.tracking_numbers.len(),
        "tracked batch"
    );
    Ok(Json(results))
}

/// Pure format validation; works for every carrier, configured or not.
async fn validate(Query(params): Query<ValidateParams>) -> Json<ValidateResponse> {
    let valid = carriers::validate_format(params.carrier, &params.tracking_number);
    Json(ValidateResponse {
        carrier: params.carrier,
        tracking_number: params.tracking_number,
        valid,
    })
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "carriers": state.registry.configured(),
    }))
}

async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.prometheus.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn empty_state() -> AppState {
        AppState {
            registry: Arc::new(CarrierRegistry::new()),
            prometheus: metrics_exporter_prometheus::PrometheusBuilder::new()
                .build_recorder()
                .handle(),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validate_works_with_zero_configured_carriers() {
        let app = build_router(empty_state(), 16);
        let response = app
            .oneshot(
                Request::get("/v1/validate?carrier=ups&tracking_number=1Z999AA10123456784")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["valid"], true);
        assert_eq!(body["carrier"], "ups");
    }

    #[tokio::test]
    async fn validate_rejects_malformed_numbers() {
        let app = build_router(empty_state(), 16);
        let response = app
            .oneshot(
                Request::get("/v1/validate?carrier=fedex&tracking_number=nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["valid"], false);
    }

    #[tokio::test]
    async fn tracking_unconfigured_carrier_is_503() {
        let app = build_router(empty_state(), 16);
        let request = Request::post("/v1/track")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"carrier": "dhl", "tracking_number": "1234567890"}"#,
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "carrier_not_configured");
        assert_eq!(body["error"]["carrier"], "dhl");
    }

    #[tokio::test]
    async fn health_lists_configured_carriers() {
        let app = build_router(empty_state(), 16);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["carriers"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn unknown_carrier_name_is_a_client_error() {
        let app = build_router(empty_state(), 16);
        let response = app
            .oneshot(
                Request::get("/v1/validate?carrier=pigeon&tracking_number=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
