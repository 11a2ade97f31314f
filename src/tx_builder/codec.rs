//! Base64 transport envelope for Solana wire-format transactions
//!
//! Encoding never requires or verifies signatures: the builder's output is
//! encoded unsigned so it can be signed out of process. Decoding checks
//! structure only; signature validity is left to the node.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bincode::Options;
use serde::{Deserialize, Serialize};
use solana_sdk::{sanitize::Sanitize, transaction::Transaction};

use crate::errors::{TransferError, TransferResult};

/// Largest serialized transaction the network accepts (one packet)
pub const MAX_TRANSACTION_SIZE: usize = 1232;

/// Base64 text of a serialized transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedTransaction(String);

impl EncodedTransaction {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for EncodedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EncodedTransaction> for String {
    fn from(value: EncodedTransaction) -> Self {
        value.0
    }
}

fn wire_options() -> impl Options {
    bincode::options()
        .with_limit(MAX_TRANSACTION_SIZE as u64)
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Serialize to wire format and base64-encode
pub fn encode_transaction(tx: &Transaction) -> TransferResult<EncodedTransaction> {
    let bytes = bincode::serialize(tx)
        .map_err(|e| TransferError::malformed(format!("serialization failed: {}", e)))?;
    Ok(EncodedTransaction(STANDARD.encode(bytes)))
}

/// Decode base64 text into a structurally valid transaction
pub fn decode_transaction(encoded: &str) -> TransferResult<Transaction> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(TransferError::malformed("empty transaction payload"));
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| TransferError::malformed(format!("invalid base64: {}", e)))?;

    if bytes.len() > MAX_TRANSACTION_SIZE {
        return Err(TransferError::malformed(format!(
            "transaction is {} bytes, limit is {}",
            bytes.len(),
            MAX_TRANSACTION_SIZE
        )));
    }

    let tx: Transaction = wire_options()
        .deserialize(&bytes)
        .map_err(|e| TransferError::malformed(format!("failed to deserialize transaction: {}", e)))?;

    tx.sanitize()
        .map_err(|e| TransferError::malformed(format!("transaction failed sanitization: {}", e)))?;

    Ok(tx)
}
