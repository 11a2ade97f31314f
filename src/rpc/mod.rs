//! RPC node boundary
//!
//! The transfer pipeline never talks to `RpcClient` directly; it goes through
//! [`ChainClient`] so the node can be swapped for a scripted one in tests.

use async_trait::async_trait;
use solana_sdk::{hash::Hash, signature::Signature, transaction::Transaction};

use crate::errors::TransferResult;

pub mod solana_rpc;

pub use solana_rpc::SolanaRpc;

/// Status of a broadcast signature as reported by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Not yet seen at the requested commitment
    Pending,
    /// Included and executed successfully
    Confirmed,
    /// Included, but program execution failed
    Failed(String),
}

/// Operations the transfer pipeline needs from a blockchain node
#[async_trait]
pub trait ChainClient: Send + Sync + std::fmt::Debug {
    /// Recent blockhash and the last block height at which it is valid
    async fn latest_blockhash(&self) -> TransferResult<(Hash, u64)>;

    /// Broadcast a (signed) transaction
    async fn send_transaction(&self, tx: &Transaction) -> TransferResult<Signature>;

    async fn signature_status(&self, signature: &Signature) -> TransferResult<ConfirmationStatus>;

    async fn block_height(&self) -> TransferResult<u64>;

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> TransferResult<bool>;

    /// Endpoint label for logs
    fn endpoint(&self) -> &str;
}
