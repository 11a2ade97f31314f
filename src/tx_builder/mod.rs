//! Transfer transaction construction and transport encoding
//!
//! ## Architecture
//!
//! - **builder**: builds the single-instruction SOL transfer for a sender,
//!   stamped with a recent blockhash and the sender as fee payer
//! - **codec**: base64 envelope around the Solana wire format, used where a
//!   transaction crosses the client/server boundary for out-of-process signing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sol_relay::config::RpcConfig;
//! use sol_relay::policy::TransferPolicy;
//! use sol_relay::rpc::SolanaRpc;
//! use sol_relay::tx_builder::{encode_transaction, TransferBuilder};
//!
//! # async fn example() -> Result<(), sol_relay::errors::TransferError> {
//! let rpc = Arc::new(SolanaRpc::new(&RpcConfig::default()));
//! let builder = TransferBuilder::new(rpc, TransferPolicy::default());
//!
//! let built = builder.build("6RJW9Ybc1hX4iETDgqT33nUr1MA8vif8QgVBw6tXPDPj").await?;
//! let encoded = encode_transaction(&built.transaction)?;
//! println!("{}", encoded);
//! # Ok(())
//! # }
//! ```

mod builder;
mod codec;

pub use builder::{BuiltTransfer, TransferBuilder};
pub use codec::{decode_transaction, encode_transaction, EncodedTransaction, MAX_TRANSACTION_SIZE};
