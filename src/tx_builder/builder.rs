//! Core transfer builder
//!
//! ## Responsibilities
//! - Validate the sender before any network traffic
//! - Compose the single system transfer instruction from the policy
//! - Stamp the freshness token (recent blockhash) and fee payer

use solana_sdk::{
    hash::Hash, message::Message, pubkey::Pubkey, system_instruction, transaction::Transaction,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::errors::TransferResult;
use crate::metrics::{metrics, Timer};
use crate::policy::{parse_address, TransferPolicy};
use crate::rpc::ChainClient;

/// An unsigned transfer plus the terms it was built with
///
/// `last_valid_block_height` bounds the confirmation wait for this
/// transaction; it is not part of the wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTransfer {
    pub transaction: Transaction,
    pub sender: Pubkey,
    pub recipient: Pubkey,
    pub lamports: u64,
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Builds policy-fixed SOL transfers
#[derive(Debug, Clone)]
pub struct TransferBuilder {
    rpc: Arc<dyn ChainClient>,
    policy: TransferPolicy,
}

impl TransferBuilder {
    pub fn new(rpc: Arc<dyn ChainClient>, policy: TransferPolicy) -> Self {
        Self { rpc, policy }
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    /// Validate `sender` and build the transfer
    ///
    /// A malformed address fails with `InvalidAddress` before the node is
    /// contacted.
    pub async fn build(&self, sender: &str) -> TransferResult<BuiltTransfer> {
        let sender = parse_address(sender)?;
        self.build_for(sender).await
    }

    #[instrument(skip(self, sender), fields(sender = %sender, lamports = self.policy.lamports))]
    pub async fn build_for(&self, sender: Pubkey) -> TransferResult<BuiltTransfer> {
        let timer = Timer::with_name("build_latency_seconds");

        let instruction =
            system_instruction::transfer(&sender, &self.policy.recipient, self.policy.lamports);

        let (blockhash, last_valid_block_height) = self.rpc.latest_blockhash().await?;
        debug!(%blockhash, last_valid_block_height, "Stamping transfer with recent blockhash");

        let message = Message::new_with_blockhash(&[instruction], Some(&sender), &blockhash);
        let transaction = Transaction::new_unsigned(message);

        timer.finish();
        metrics().transactions_built.inc();
        info!(recipient = %self.policy.recipient, "Transfer transaction built");

        Ok(BuiltTransfer {
            transaction,
            sender,
            recipient: self.policy.recipient,
            lamports: self.policy.lamports,
            blockhash,
            last_valid_block_height,
        })
    }
}
