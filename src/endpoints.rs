//! # Relay HTTP API
//!
//! Builds the axum router that exposes the transfer relay. Handlers share the
//! builder and submitter through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method       | Path                       | Description                          |
//! |--------------|----------------------------|--------------------------------------|
//! | POST/OPTIONS | `/api/send-sol`            | Build the unsigned policy transfer   |
//! | POST/OPTIONS | `/api/confirm-transaction` | Broadcast a signed transfer, confirm |
//! | GET          | `/health`                  | Liveness probe                       |
//! | GET          | `/metrics`                 | Prometheus text exposition           |
//!
//! Failures come back as `{"error": "..."}`: 400 for caller mistakes, 500 for
//! everything the node or the workflow reports.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};

use crate::errors::TransferError;
use crate::metrics::metrics;
use crate::observability::CorrelationId;
use crate::submission::TransactionSubmitter;
use crate::tx_builder::{encode_transaction, TransferBuilder};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub const MISSING_SENDER: &str = "Missing sender public key";
pub const INVALID_SENDER: &str = "Invalid sender public key";
pub const MISSING_SIGNED_TRANSACTION: &str = "Missing signed transaction";
pub const CREATED_MESSAGE: &str = "Transaction created successfully";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub builder: TransferBuilder,
    pub submitter: TransactionSubmitter,
    pub version: String,
}

impl AppState {
    pub fn new(builder: TransferBuilder, submitter: TransactionSubmitter) -> Self {
        Self {
            builder,
            submitter,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all relay routes, CORS, and tracing
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/api/send-sol", post(send_sol_handler).options(preflight_handler))
        .route(
            "/api/confirm-transaction",
            post(confirm_transaction_handler).options(preflight_handler),
        )
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /api/send-sol`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    #[serde(default, alias = "senderAddress")]
    pub sender_public_key: Option<String>,
}

/// Unsigned transfer handed back for signing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionResponse {
    /// base64 wire form, unsigned
    pub transaction: String,
    pub recipient_address: String,
    /// Amount in SOL
    pub amount: f64,
    pub message: String,
}

/// Body of `POST /api/confirm-transaction`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmTransactionRequest {
    #[serde(default)]
    pub signed_transaction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmTransactionResponse {
    pub signature: String,
    pub message: String,
}

/// Generic error body returned by the relay on failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Status code for a workflow failure: only a bad sender is the caller's
/// fault, the rest is reported as a server error
pub fn status_for(err: &TransferError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn json_response<T: Serialize>(status: StatusCode, id: &CorrelationId, body: T) -> Response {
    (
        status,
        [(HeaderName::from_static(REQUEST_ID_HEADER), id.to_string())],
        Json(body),
    )
        .into_response()
}

fn error_response(status: StatusCode, id: &CorrelationId, message: impl Into<String>) -> Response {
    json_response(
        status,
        id,
        ErrorResponse {
            error: message.into(),
        },
    )
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, String> {
    serde_json::from_slice(body).map_err(|e| format!("Invalid request body: {}", e))
}

fn correlation_id(headers: &HeaderMap) -> CorrelationId {
    CorrelationId::from_header(
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `OPTIONS` on the relay routes; the CORS layer adds the headers
async fn preflight_handler() -> impl IntoResponse {
    Json(serde_json::json!({}))
}

/// `GET /health`: liveness only, the RPC node is not contacted
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
    })
}

async fn metrics_handler() -> Response {
    match metrics().render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// `POST /api/send-sol`: build the unsigned transfer for the sender
async fn send_sol_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = correlation_id(&headers);
    let span = info_span!("send_sol", request_id = %id);

    async move {
        let request: CreateTransactionRequest = match parse_body(&body) {
            Ok(request) => request,
            Err(message) => {
                warn!(%message, "Rejected request body");
                return error_response(StatusCode::BAD_REQUEST, &id, message);
            }
        };

        let sender = match request.sender_public_key.as_deref() {
            Some(sender) if !sender.is_empty() => sender,
            _ => return error_response(StatusCode::BAD_REQUEST, &id, MISSING_SENDER),
        };

        let built = match state.builder.build(sender).await {
            Ok(built) => built,
            Err(TransferError::InvalidAddress(reason)) => {
                warn!(%reason, "Invalid sender");
                return error_response(StatusCode::BAD_REQUEST, &id, INVALID_SENDER);
            }
            Err(e) => {
                error!(error = %e, "Error creating transaction");
                return error_response(status_for(&e), &id, e.to_string());
            }
        };

        let encoded = match encode_transaction(&built.transaction) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, "Error encoding transaction");
                return error_response(status_for(&e), &id, e.to_string());
            }
        };

        let policy = state.builder.policy();
        info!(sender = %built.sender, "Transaction created");
        json_response(
            StatusCode::OK,
            &id,
            CreateTransactionResponse {
                transaction: encoded.into_inner(),
                recipient_address: policy.recipient.to_string(),
                amount: policy.amount_sol,
                message: CREATED_MESSAGE.to_string(),
            },
        )
    }
    .instrument(span)
    .await
}

/// `POST /api/confirm-transaction`: broadcast a signed transfer and wait
/// for confirmation
async fn confirm_transaction_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = correlation_id(&headers);
    let span = info_span!("confirm_transaction", request_id = %id);

    async move {
        let request: ConfirmTransactionRequest = match parse_body(&body) {
            Ok(request) => request,
            Err(message) => {
                warn!(%message, "Rejected request body");
                return error_response(StatusCode::BAD_REQUEST, &id, message);
            }
        };

        let encoded = match request.signed_transaction.as_deref() {
            Some(encoded) if !encoded.is_empty() => encoded,
            _ => return error_response(StatusCode::BAD_REQUEST, &id, MISSING_SIGNED_TRANSACTION),
        };

        match state.submitter.submit_encoded(encoded).await {
            Ok(receipt) => json_response(
                StatusCode::OK,
                &id,
                ConfirmTransactionResponse {
                    signature: receipt.signature.to_string(),
                    message: receipt.message,
                },
            ),
            Err(e) => {
                error!(error = %e, category = e.category(), "Error confirming transaction");
                error_response(status_for(&e), &id, e.to_string())
            }
        }
    }
    .instrument(span)
    .await
}
