//! Wallet session management
//!
//! Wallet extensions are reached through [`WalletAdapter`], one trait object
//! per installed extension. Discovery keeps whatever adapters report
//! themselves installed; an empty set is a valid state.
//!
//! [`WalletSession`] owns the connect/disconnect lifecycle and is the only
//! path from a connected wallet to the transfer workflow.

use async_trait::async_trait;
use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::Transaction};
use std::sync::Arc;
use thiserror::Error;

use crate::errors::TransferError;

mod guard;
mod session;

pub use guard::SubmissionGuard;
pub use session::{SessionState, WalletSession, TRANSFER_SUCCESS_PREFIX};

/// Availability of a wallet extension in the current environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WalletReadyState {
    /// Extension is present and can be connected
    Installed,
    /// Extension can be loaded on demand
    Loadable,
    NotDetected,
    Unsupported,
}

/// Errors reported by a wallet extension
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// User dismissed the approval prompt
    #[error("User rejected the request")]
    Rejected,

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Signing failed: {0}")]
    Signing(String),

    /// The extension broadcast the transaction and the node refused it
    #[error("Send failed: {0}")]
    Send(String),

    #[error("{0}")]
    Other(String),
}

impl From<WalletError> for TransferError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected => TransferError::Wallet(err.to_string()),
            WalletError::NotConnected => TransferError::WalletNotConnected,
            WalletError::Send(msg) => TransferError::Submission(msg),
            other => TransferError::Wallet(other.to_string()),
        }
    }
}

/// Capability surface shared by every wallet extension
#[async_trait]
pub trait WalletAdapter: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn icon(&self) -> Option<&str> {
        None
    }

    fn ready_state(&self) -> WalletReadyState;

    /// Ask the extension for access; resolves to the account address
    async fn connect(&self) -> Result<Pubkey, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;

    /// Sign without broadcasting
    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError>;

    /// Sign and let the extension broadcast
    async fn sign_and_send(&self, tx: Transaction) -> Result<Signature, WalletError>;
}

/// Display data for a discovered wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletInfo {
    pub name: String,
    pub icon: Option<String>,
    pub ready_state: WalletReadyState,
}

impl WalletInfo {
    pub fn of(adapter: &dyn WalletAdapter) -> Self {
        Self {
            name: adapter.name().to_string(),
            icon: adapter.icon().map(str::to_string),
            ready_state: adapter.ready_state(),
        }
    }
}

/// Keep the candidates whose extension is installed, in order
pub fn discover_wallets(candidates: Vec<Arc<dyn WalletAdapter>>) -> Vec<Arc<dyn WalletAdapter>> {
    let total = candidates.len();
    let found: Vec<_> = candidates
        .into_iter()
        .filter(|w| w.ready_state() == WalletReadyState::Installed)
        .collect();
    tracing::info!(total, installed = found.len(), "Wallet discovery finished");
    found
}
