//! Submission and confirmation workflow
//!
//! A submission is at least two sequential round trips: broadcast, then one
//! or more signature status polls. Each round trip is attributed to its own
//! failure category:
//!
//! | Round trip | Failure                                   | Error                 |
//! |------------|-------------------------------------------|-----------------------|
//! | broadcast  | node unreachable                          | `NetworkUnavailable`  |
//! | broadcast  | node rejected the bytes                   | `Submission`          |
//! | status     | execution error reported                  | `OnChainExecution`    |
//! | status     | blockhash expired / deadline passed       | `ConfirmationTimeout` |
//! | status     | `max_poll_errors` consecutive poll errors | `NetworkUnavailable`  |
//!
//! Abandoning the wait (`submit_with_cancel`) never recalls the broadcast.

use serde::Serialize;
use solana_sdk::{hash::Hash, signature::Signature, transaction::Transaction};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RpcConfig;
use crate::errors::{TimeoutReason, TransferError, TransferResult};
use crate::metrics::{metrics, Timer};
use crate::rpc::{ChainClient, ConfirmationStatus};
use crate::tx_builder::decode_transaction;

/// Message returned with every confirmed submission
pub const CONFIRMED_MESSAGE: &str = "Transaction confirmed successfully";

/// Successful submission outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    #[serde(serialize_with = "serialize_signature")]
    pub signature: Signature,
    pub message: String,
}

/// Confirmation wait bounds
#[derive(Debug, Clone, Copy)]
pub struct ConfirmPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub max_poll_errors: u32,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self::from(&RpcConfig::default())
    }
}

impl From<&RpcConfig> for ConfirmPolicy {
    fn from(config: &RpcConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            timeout: config.confirm_timeout(),
            max_poll_errors: config.max_poll_errors,
        }
    }
}

/// Broadcasts transactions and waits for their confirmation
#[derive(Debug, Clone)]
pub struct TransactionSubmitter {
    rpc: Arc<dyn ChainClient>,
    policy: ConfirmPolicy,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn ChainClient>, policy: ConfirmPolicy) -> Self {
        Self { rpc, policy }
    }

    pub fn policy(&self) -> &ConfirmPolicy {
        &self.policy
    }

    /// Decode an encoded signed transaction, then submit it
    pub async fn submit_encoded(&self, encoded: &str) -> TransferResult<SubmissionReceipt> {
        let tx = decode_transaction(encoded)?;
        self.submit(&tx).await
    }

    /// Broadcast `tx` and wait for confirmation
    ///
    /// The validity window is keyed to the blockhash embedded in `tx`.
    #[instrument(skip(self, tx), fields(endpoint = %self.rpc.endpoint()))]
    pub async fn submit(&self, tx: &Transaction) -> TransferResult<SubmissionReceipt> {
        let (signature, blockhash) = self.broadcast(tx).await?;
        self.confirm(&signature, &blockhash, None).await
    }

    /// Like [`submit`](Self::submit), but stop waiting once `cancel` resolves
    ///
    /// An abandoned wait yields `Abandoned`, which is not a failure of the
    /// transaction: the broadcast may still land.
    pub async fn submit_with_cancel<F>(&self, tx: &Transaction, cancel: F) -> TransferResult<SubmissionReceipt>
    where
        F: Future<Output = ()>,
    {
        let (signature, blockhash) = self.broadcast(tx).await?;

        tokio::select! {
            result = self.wait_for_confirmation(&signature, &blockhash, None) => {
                record_outcome(&result);
                result
            }
            _ = cancel => {
                warn!(%signature, "Confirmation wait abandoned; broadcast may still land");
                Err(TransferError::Abandoned { signature: signature.to_string() })
            }
        }
    }

    async fn broadcast(&self, tx: &Transaction) -> TransferResult<(Signature, Hash)> {
        ensure_submittable(tx)?;
        metrics().submissions_total.inc();

        let blockhash = tx.message.recent_blockhash;
        let signature = self.rpc.send_transaction(tx).await.map_err(|e| {
            error!(error = %e, "Broadcast failed");
            metrics().record_failure(e.category());
            e
        })?;

        info!(%signature, %blockhash, "Transaction broadcast");
        Ok((signature, blockhash))
    }

    /// Wait for a signature that was already broadcast (by this submitter or
    /// by a wallet extension) and record the outcome
    ///
    /// With `last_valid_block_height` known, expiry is detected from the
    /// current block height; otherwise the node is asked whether `blockhash`
    /// is still valid.
    pub async fn confirm(
        &self,
        signature: &Signature,
        blockhash: &Hash,
        last_valid_block_height: Option<u64>,
    ) -> TransferResult<SubmissionReceipt> {
        let result = self
            .wait_for_confirmation(signature, blockhash, last_valid_block_height)
            .await;
        record_outcome(&result);
        result
    }

    /// Poll until `signature` is confirmed, fails, or its window closes
    ///
    /// The deadline covers in-flight RPC calls too, so a slow node cannot
    /// stretch the wait past `policy.timeout`.
    #[instrument(skip(self, signature, blockhash), fields(signature = %signature))]
    async fn wait_for_confirmation(
        &self,
        signature: &Signature,
        blockhash: &Hash,
        last_valid_block_height: Option<u64>,
    ) -> TransferResult<SubmissionReceipt> {
        let timer = Timer::with_name("confirm_latency_seconds");
        let deadline = Instant::now() + self.policy.timeout;

        let outcome = tokio::time::timeout_at(
            deadline,
            self.poll_statuses(signature, blockhash, last_valid_block_height),
        )
        .await;

        match outcome {
            Ok(result) => {
                if result.is_ok() {
                    timer.finish();
                }
                result
            }
            Err(_) => {
                warn!("Confirmation deadline passed");
                Err(TransferError::confirmation_timeout(
                    signature,
                    TimeoutReason::Deadline,
                ))
            }
        }
    }

    async fn poll_statuses(
        &self,
        signature: &Signature,
        blockhash: &Hash,
        last_valid_block_height: Option<u64>,
    ) -> TransferResult<SubmissionReceipt> {
        let mut consecutive_errors = 0u32;

        loop {
            match self.rpc.signature_status(signature).await {
                Ok(ConfirmationStatus::Confirmed) => {
                    info!("Transaction confirmed");
                    return Ok(SubmissionReceipt {
                        signature: *signature,
                        message: CONFIRMED_MESSAGE.to_string(),
                    });
                }
                Ok(ConfirmationStatus::Failed(err)) => {
                    warn!(error = %err, "Transaction executed with error");
                    return Err(TransferError::OnChainExecution(err));
                }
                Ok(ConfirmationStatus::Pending) => {
                    consecutive_errors = 0;
                    if self.window_closed(blockhash, last_valid_block_height).await {
                        return self.final_check(signature).await;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(error = %e, attempt = consecutive_errors, "Signature status poll failed");
                    if consecutive_errors > self.policy.max_poll_errors {
                        return Err(e);
                    }
                }
            }

            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }

    async fn window_closed(&self, blockhash: &Hash, last_valid_block_height: Option<u64>) -> bool {
        let closed = match last_valid_block_height {
            Some(last_valid) => self
                .rpc
                .block_height()
                .await
                .map(|height| height > last_valid),
            None => self.rpc.is_blockhash_valid(blockhash).await.map(|valid| !valid),
        };
        match closed {
            Ok(closed) => closed,
            Err(e) => {
                // Treat as still open; the deadline bounds the wait
                debug!(error = %e, "Could not check blockhash validity");
                false
            }
        }
    }

    /// One last status read after expiry: the transaction may have landed in
    /// the final valid block
    async fn final_check(&self, signature: &Signature) -> TransferResult<SubmissionReceipt> {
        match self.rpc.signature_status(signature).await {
            Ok(ConfirmationStatus::Confirmed) => Ok(SubmissionReceipt {
                signature: *signature,
                message: CONFIRMED_MESSAGE.to_string(),
            }),
            Ok(ConfirmationStatus::Failed(err)) => Err(TransferError::OnChainExecution(err)),
            _ => {
                warn!("Blockhash expired before confirmation");
                Err(TransferError::confirmation_timeout(
                    signature,
                    TimeoutReason::BlockhashExpired,
                ))
            }
        }
    }
}

/// A transaction must carry a fee payer and a freshness token before broadcast
fn ensure_submittable(tx: &Transaction) -> TransferResult<()> {
    if tx.message.account_keys.is_empty() || tx.message.header.num_required_signatures == 0 {
        return Err(TransferError::malformed("transaction has no fee payer"));
    }
    if tx.message.recent_blockhash == Hash::default() {
        return Err(TransferError::malformed("transaction has no recent blockhash"));
    }
    Ok(())
}

fn record_outcome(result: &TransferResult<SubmissionReceipt>) {
    match result {
        Ok(_) => metrics().submissions_confirmed.inc(),
        Err(e) => metrics().record_failure(e.category()),
    }
}

fn serialize_signature<S: serde::Serializer>(sig: &Signature, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&sig.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{signed_transfer, MockChain};

    fn submitter(chain: Arc<MockChain>) -> TransactionSubmitter {
        TransactionSubmitter::new(
            chain,
            ConfirmPolicy {
                poll_interval: Duration::from_millis(100),
                timeout: Duration::from_secs(5),
                max_poll_errors: 2,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_after_pending_polls() {
        let chain = Arc::new(MockChain::new());
        chain.script_statuses(vec![
            Ok(ConfirmationStatus::Pending),
            Ok(ConfirmationStatus::Pending),
            Ok(ConfirmationStatus::Confirmed),
        ]);
        let tx = signed_transfer(chain.blockhash());

        let receipt = submitter(chain.clone()).submit(&tx).await.unwrap();
        assert_eq!(receipt.signature, tx.signatures[0]);
        assert_eq!(receipt.message, CONFIRMED_MESSAGE);
        assert_eq!(chain.sent_count(), 1);
        assert_eq!(chain.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_error_is_distinct_from_rejection() {
        let chain = Arc::new(MockChain::new());
        chain.script_statuses(vec![Ok(ConfirmationStatus::Failed(
            "Error processing Instruction 0: custom program error: 0x1".to_string(),
        ))]);
        let tx = signed_transfer(chain.blockhash());

        let err = submitter(chain).submit(&tx).await.unwrap_err();
        assert!(matches!(err, TransferError::OnChainExecution(_)));
        assert!(err.to_string().starts_with("Transaction failed:"));
    }

    #[tokio::test]
    async fn test_broadcast_rejection_skips_confirmation() {
        let chain = Arc::new(MockChain::new());
        chain.fail_send(TransferError::Submission("insufficient funds for fee".into()));
        let tx = signed_transfer(chain.blockhash());

        let err = submitter(chain.clone()).submit(&tx).await.unwrap_err();
        assert!(matches!(err, TransferError::Submission(_)));
        assert_eq!(chain.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_resolves_to_timeout_not_hang() {
        let chain = Arc::new(MockChain::new());
        let tx = signed_transfer(chain.blockhash());

        let err = submitter(chain).submit(&tx).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::ConfirmationTimeout {
                reason: TimeoutReason::Deadline,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_status_call_still_hits_deadline() {
        let chain = Arc::new(MockChain::new());
        // Status requests never answer
        chain.hold_statuses();
        let tx = signed_transfer(chain.blockhash());

        let started = Instant::now();
        let err = submitter(chain.clone()).submit(&tx).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::ConfirmationTimeout {
                reason: TimeoutReason::Deadline,
                ..
            }
        ));
        assert!(started.elapsed() <= Duration::from_secs(5) + Duration::from_millis(1));
        assert_eq!(chain.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_blockhash_is_terminal() {
        let chain = Arc::new(MockChain::new());
        chain.set_blockhash_valid(false);
        let tx = signed_transfer(chain.blockhash());

        let err = submitter(chain.clone()).submit(&tx).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::ConfirmationTimeout {
                reason: TimeoutReason::BlockhashExpired,
                ..
            }
        ));
        // first poll + final check
        assert_eq!(chain.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_height_past_window_expires() {
        let chain = Arc::new(MockChain::new());
        chain.set_block_height(chain.last_valid_block_height() + 1);
        let tx = signed_transfer(chain.blockhash());

        let (signature, blockhash) = (tx.signatures[0], tx.message.recent_blockhash);
        let err = submitter(chain.clone())
            .confirm(&signature, &blockhash, Some(chain.last_valid_block_height()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::ConfirmationTimeout {
                reason: TimeoutReason::BlockhashExpired,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_landing_in_last_block_still_confirms() {
        let chain = Arc::new(MockChain::new());
        chain.set_blockhash_valid(false);
        chain.script_statuses(vec![
            Ok(ConfirmationStatus::Pending),
            Ok(ConfirmationStatus::Confirmed),
        ]);
        let tx = signed_transfer(chain.blockhash());

        assert!(submitter(chain).submit(&tx).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_poll_errors_are_tolerated() {
        let chain = Arc::new(MockChain::new());
        chain.script_statuses(vec![
            Err(TransferError::NetworkUnavailable("reset".into())),
            Err(TransferError::NetworkUnavailable("reset".into())),
            Ok(ConfirmationStatus::Confirmed),
        ]);
        let tx = signed_transfer(chain.blockhash());

        assert!(submitter(chain).submit(&tx).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_poll_errors_surface_network_failure() {
        let chain = Arc::new(MockChain::new());
        chain.script_statuses(vec![
            Err(TransferError::NetworkUnavailable("reset".into())),
            Err(TransferError::NetworkUnavailable("reset".into())),
            Err(TransferError::NetworkUnavailable("reset".into())),
        ]);
        let tx = signed_transfer(chain.blockhash());

        let err = submitter(chain).submit(&tx).await.unwrap_err();
        assert!(matches!(err, TransferError::NetworkUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_is_not_a_failure() {
        let chain = Arc::new(MockChain::new());
        let tx = signed_transfer(chain.blockhash());

        let cancel = tokio::time::sleep(Duration::from_millis(250));
        let err = submitter(chain.clone())
            .submit_with_cancel(&tx, cancel)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransferError::Abandoned {
                signature: tx.signatures[0].to_string()
            }
        );
        // The broadcast happened and is not recalled
        assert_eq!(chain.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_blockhash_is_refused_before_broadcast() {
        let chain = Arc::new(MockChain::new());
        let tx = signed_transfer(Hash::default());

        let err = submitter(chain.clone()).submit(&tx).await.unwrap_err();
        assert!(matches!(err, TransferError::MalformedTransaction(_)));
        assert_eq!(chain.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_encoded_rejects_bad_payload() {
        let chain = Arc::new(MockChain::new());
        let err = submitter(chain.clone())
            .submit_encoded("not-base64-valid-tx")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::MalformedTransaction(_)));
        assert_eq!(chain.sent_count(), 0);
    }
}
