//! HTTP client for the relay endpoints
//!
//! Used by wallet sessions that let the relay build and broadcast while the
//! wallet only signs.

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::endpoints::{
    ConfirmTransactionRequest, ConfirmTransactionResponse, CreateTransactionRequest,
    CreateTransactionResponse, ErrorResponse, INVALID_SENDER,
};
use crate::errors::{TransferError, TransferResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Typed client for `/api/send-sol` and `/api/confirm-transaction`
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> TransferResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// `timeout` must cover the relay's own confirmation wait
    pub fn with_timeout(base_url: &str, timeout: Duration) -> TransferResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransferError::Relay {
                status: 0,
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self::from_client(http, base_url))
    }

    /// Wrap a preconfigured HTTP client
    pub fn from_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the relay for the unsigned transfer from `sender`
    #[instrument(skip(self), fields(relay = %self.base_url))]
    pub async fn create_transaction(&self, sender: &str) -> TransferResult<CreateTransactionResponse> {
        let request = CreateTransactionRequest {
            sender_public_key: Some(sender.to_string()),
        };
        match self.post("/api/send-sol", &request).await {
            Err(TransferError::Relay { status: 400, message }) if message == INVALID_SENDER => {
                Err(TransferError::InvalidAddress(sender.to_string()))
            }
            other => other,
        }
    }

    /// Hand a signed, base64-encoded transfer to the relay and wait for its
    /// confirmation verdict
    #[instrument(skip(self, signed_transaction), fields(relay = %self.base_url))]
    pub async fn confirm_transaction(
        &self,
        signed_transaction: &str,
    ) -> TransferResult<ConfirmTransactionResponse> {
        let request = ConfirmTransactionRequest {
            signed_transaction: Some(signed_transaction.to_string()),
        };
        self.post("/api/confirm-transaction", &request).await
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> TransferResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransferError::Relay {
                status: 0,
                message: e.to_string(),
            })?;

        let status = response.status();
        debug!(%url, %status, "Relay responded");

        let bytes = response.bytes().await.map_err(|e| TransferError::Relay {
            status: status.as_u16(),
            message: e.to_string(),
        })?;

        if status != StatusCode::OK {
            let message = serde_json::from_slice::<ErrorResponse>(&bytes)
                .map(|body| body.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(TransferError::Relay {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| TransferError::Relay {
            status: status.as_u16(),
            message: format!("unexpected response body: {}", e),
        })
    }
}
