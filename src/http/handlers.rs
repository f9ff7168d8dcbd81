//! Request handlers

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::db::AddressStore;
use crate::error::Error;
use crate::services::coordinator::{BatchConfig, BatchCoordinator};
use crate::services::geocoding::Geocoder;
use crate::services::processor::AddressProcessor;
use crate::types::{AddressRecord, BatchCheckpoint, BatchMode, BatchOutcome, ProcessResult};

const INVALID_REQUEST: &str =
    "Invalid request. Specify 'address' for single processing or 'isBatch' for batch processing.";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AddressStore>,
    pub geocoder: Arc<dyn Geocoder>,
    pub batch: BatchConfig,
}

/// The two accepted request shapes, folded into one struct: either
/// `address` is present (single record) or `isBatch` is true (batch scan).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeRequest {
    pub address: Option<AddressRecord>,
    #[serde(default)]
    pub is_batch: bool,
    #[serde(default)]
    pub mode: Option<BatchMode>,
    pub last_processed_id: Option<Uuid>,
    pub last_processed_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub message: String,
    pub processed_count: usize,
    pub total_count: i64,
    pub last_processed_id: Uuid,
    pub last_processed_timestamp: Option<DateTime<Utc>>,
    pub is_complete: bool,
    pub results: Vec<ProcessResult>,
}

impl From<BatchOutcome> for BatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        let message = if outcome.is_complete {
            "All addresses processed".to_string()
        } else {
            "Batch processed, continuation required".to_string()
        };
        Self {
            message,
            processed_count: outcome.results.len(),
            total_count: outcome.total_count,
            last_processed_id: outcome.checkpoint.last_processed_id,
            last_processed_timestamp: outcome.checkpoint.last_processed_timestamp,
            is_complete: outcome.is_complete,
            results: outcome.results,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /geocode` — process one address synchronously, or run a batch
/// invocation from the supplied checkpoint.
pub async fn geocode(
    State(state): State<AppState>,
    request: Result<Json<GeocodeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(json) => json,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, INVALID_REQUEST),
    };

    if let Some(address) = request.address {
        let processor = AddressProcessor::new(Arc::clone(&state.store), Arc::clone(&state.geocoder));
        let result = processor.process(&address).await;
        return (StatusCode::OK, Json(result)).into_response();
    }

    if request.is_batch {
        let checkpoint = BatchCheckpoint::new(
            request.last_processed_id.unwrap_or_else(Uuid::nil),
            request.last_processed_timestamp,
        );
        let coordinator = BatchCoordinator::new(
            Arc::clone(&state.store),
            Arc::clone(&state.geocoder),
            state.batch.clone(),
        );

        return match coordinator.run(request.mode.unwrap_or_default(), checkpoint).await {
            Ok(outcome) => (StatusCode::OK, Json(BatchResponse::from(outcome))).into_response(),
            Err(e) => {
                error!(error = %e, "batch invocation failed");
                let status = match e {
                    Error::Validation(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                error_response(status, e.to_string())
            }
        };
    }

    error_response(StatusCode::BAD_REQUEST, INVALID_REQUEST)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::db::memory::MemoryAddressStore;
    use crate::services::geocoding::MockGeocoder;
    use crate::types::ProcessStatus;

    fn test_state(store: MemoryAddressStore) -> AppState {
        AppState {
            store: Arc::new(store),
            geocoder: Arc::new(MockGeocoder::new()),
            batch: BatchConfig {
                api_delay: Duration::ZERO,
                ..BatchConfig::default()
            },
        }
    }

    fn post_geocode(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/geocode")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn stale_record(text: &str) -> AddressRecord {
        AddressRecord {
            id: Uuid::new_v4(),
            full_address_text: Some(text.to_string()),
            lat: None,
            long: None,
            country: None,
            updated_at: Some(Utc::now() - chrono::Duration::hours(1)),
        }
    }

    #[tokio::test]
    async fn unrecognized_shape_is_rejected() {
        let app = crate::http::create_router(test_state(MemoryAddressStore::new(vec![])));

        let response = app.oneshot(post_geocode(r#"{"name":"hello"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_with_error_body() {
        let app = crate::http::create_router(test_state(MemoryAddressStore::new(vec![])));

        let response = app.oneshot(post_geocode("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn single_address_shape_returns_process_result() {
        let record = stale_record("10 Main St, Springfield");
        let app = crate::http::create_router(test_state(MemoryAddressStore::new(vec![
            record.clone(),
        ])));

        let payload = serde_json::json!({ "address": record }).to_string();
        let response = app.oneshot(post_geocode(&payload)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let result: ProcessResult = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(result.id, record.id);
        assert_eq!(result.status, ProcessStatus::Updated);
    }

    #[tokio::test]
    async fn batch_shape_returns_checkpoint_and_results() {
        let records = vec![
            stale_record("10 Main St, Springfield"),
            stale_record("12 Elm St, Shelbyville"),
        ];
        let app = crate::http::create_router(test_state(MemoryAddressStore::new(records)));

        let response = app
            .oneshot(post_geocode(r#"{"isBatch":true}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let batch: BatchResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(batch.processed_count, 2);
        assert_eq!(batch.total_count, 2);
        assert!(batch.is_complete);
        assert_eq!(batch.message, "All addresses processed");
        assert_ne!(batch.last_processed_id, Uuid::nil());
    }

    #[tokio::test]
    async fn batch_accepts_checkpoint_and_mode() {
        let records = vec![stale_record("10 Main St, Springfield")];
        let last_id = records[0].id;
        let app = crate::http::create_router(test_state(MemoryAddressStore::new(records)));

        // Checkpoint already past the only record: nothing left to do.
        let payload = serde_json::json!({
            "isBatch": true,
            "mode": "catchUp",
            "lastProcessedId": last_id,
        })
        .to_string();
        let response = app.oneshot(post_geocode(&payload)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let batch: BatchResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(batch.processed_count, 0);
        assert!(batch.is_complete);
    }

    #[tokio::test]
    async fn health_reports_version() {
        let app = crate::http::create_router(test_state(MemoryAddressStore::new(vec![])));

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["healthy"], true);
    }
}
