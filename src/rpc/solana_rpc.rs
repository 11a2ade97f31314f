//! [`ChainClient`] over the nonblocking Solana `RpcClient`

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, signature::Signature,
    transaction::Transaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{ChainClient, ConfirmationStatus};
use crate::config::RpcConfig;
use crate::errors::{RpcStage, TransferError, TransferResult};
use crate::metrics::Timer;

/// Solana JSON-RPC node at `confirmed` commitment
pub struct SolanaRpc {
    client: Arc<RpcClient>,
    endpoint: String,
    commitment: CommitmentConfig,
}

impl SolanaRpc {
    pub fn new(config: &RpcConfig) -> Self {
        let commitment = CommitmentConfig::confirmed();
        let client = RpcClient::new_with_timeout_and_commitment(
            config.url.clone(),
            Duration::from_secs(config.timeout_secs),
            commitment,
        );
        Self {
            client: Arc::new(client),
            endpoint: config.url.clone(),
            commitment,
        }
    }
}

impl std::fmt::Debug for SolanaRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpc")
            .field("endpoint", &self.endpoint)
            .field("commitment", &self.commitment.commitment)
            .finish()
    }
}

#[async_trait]
impl ChainClient for SolanaRpc {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn latest_blockhash(&self) -> TransferResult<(Hash, u64)> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let result = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| TransferError::from_client_error(e, RpcStage::Blockhash));
        timer.finish();
        let (blockhash, last_valid_block_height) = result?;
        debug!(%blockhash, last_valid_block_height, "Fetched latest blockhash");
        Ok((blockhash, last_valid_block_height))
    }

    #[instrument(skip(self, tx), fields(endpoint = %self.endpoint))]
    async fn send_transaction(&self, tx: &Transaction) -> TransferResult<Signature> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let result = self
            .client
            .send_transaction(tx)
            .await
            .map_err(|e| TransferError::from_client_error(e, RpcStage::Broadcast));
        timer.finish();
        result
    }

    async fn signature_status(&self, signature: &Signature) -> TransferResult<ConfirmationStatus> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, self.commitment)
            .await
            .map_err(|e| TransferError::from_client_error(e, RpcStage::Status))?;

        Ok(match status {
            None => ConfirmationStatus::Pending,
            Some(Ok(())) => ConfirmationStatus::Confirmed,
            Some(Err(err)) => ConfirmationStatus::Failed(err.to_string()),
        })
    }

    async fn block_height(&self) -> TransferResult<u64> {
        self.client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(|e| TransferError::from_client_error(e, RpcStage::Status))
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> TransferResult<bool> {
        self.client
            .is_blockhash_valid(blockhash, self.commitment)
            .await
            .map_err(|e| TransferError::from_client_error(e, RpcStage::Status))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
