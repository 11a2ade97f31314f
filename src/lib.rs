//! SOL transfer relay
//!
//! Builds fixed-amount SOL transfers for a sender, hands them out unsigned,
//! and broadcasts and confirms the signed result. Wallet sessions drive the
//! same pipeline from the extension side.
//!
//! ## Pipeline
//!
//! ```text
//! sender address ──> TransferBuilder ──> encode ──> wallet signs
//!                                                        │
//!      receipt <── TransactionSubmitter <── decode <─────┘
//! ```

pub mod config;
pub mod endpoints;
pub mod errors;
pub mod metrics;
pub mod observability;
pub mod policy;
pub mod relay_client;
pub mod rpc;
pub mod submission;
pub mod tx_builder;
pub mod wallet;

pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use errors::{TransferError, TransferResult};
pub use policy::TransferPolicy;
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
