//! Wallet session state machine
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected`
//!
//! - Only one wallet is connected at a time; connecting another one tears the
//!   current session down first.
//! - Connect, disconnect and transfers share one busy guard: while any of
//!   them is running, another one fails with `Busy` instead of queueing.
//! - State changes are published on a `watch` channel.

use parking_lot::Mutex;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use super::{SubmissionGuard, WalletAdapter, WalletError, WalletInfo};
use crate::errors::{TransferError, TransferResult};
use crate::relay_client::RelayClient;
use crate::submission::{SubmissionReceipt, TransactionSubmitter};
use crate::tx_builder::{decode_transaction, encode_transaction, TransferBuilder};

/// Prefix of the message returned by a successful wallet transfer
pub const TRANSFER_SUCCESS_PREFIX: &str = "Transaction successful! Signature: ";

/// Observable session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting { wallet: String },
    Connected { wallet: String, address: Pubkey },
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn address(&self) -> Option<Pubkey> {
        match self {
            Self::Connected { address, .. } => Some(*address),
            _ => None,
        }
    }

    pub fn wallet(&self) -> Option<&str> {
        match self {
            Self::Disconnected => None,
            Self::Connecting { wallet } | Self::Connected { wallet, .. } => Some(wallet),
        }
    }
}

/// Explicitly owned wallet session
pub struct WalletSession {
    wallets: Vec<Arc<dyn WalletAdapter>>,
    selected: Mutex<Option<(Arc<dyn WalletAdapter>, Pubkey)>>,
    state_tx: watch::Sender<SessionState>,
    busy: Arc<AtomicBool>,
}

impl WalletSession {
    /// Create a session over already-discovered wallets
    pub fn new(wallets: Vec<Arc<dyn WalletAdapter>>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            wallets,
            selected: Mutex::new(None),
            state_tx,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn wallets(&self) -> Vec<WalletInfo> {
        self.wallets.iter().map(|w| WalletInfo::of(w.as_ref())).collect()
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// True while a connect, disconnect or transfer is running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn publish(&self, state: SessionState) {
        info!(?state, "Wallet session state changed");
        self.state_tx.send_replace(state);
    }

    fn connected(&self) -> TransferResult<(Arc<dyn WalletAdapter>, Pubkey)> {
        self.selected
            .lock()
            .clone()
            .ok_or(TransferError::WalletNotConnected)
    }

    /// Connect the wallet called `name`
    ///
    /// Reconnecting the wallet that is already connected returns its address
    /// without another approval prompt.
    #[instrument(skip(self))]
    pub async fn connect(&self, name: &str) -> TransferResult<Pubkey> {
        let adapter = self
            .wallets
            .iter()
            .find(|w| w.name() == name)
            .cloned()
            .ok_or_else(|| TransferError::WalletNotFound(name.to_string()))?;

        let _guard = SubmissionGuard::try_acquire(&self.busy)?;

        let current = self.selected.lock().clone();
        if let Some((previous, address)) = current {
            if previous.name() == name {
                return Ok(address);
            }
            info!(previous = previous.name(), "Tearing down existing wallet session");
            self.selected.lock().take();
            if let Err(e) = previous.disconnect().await {
                warn!(wallet = previous.name(), error = %e, "Previous wallet failed to disconnect");
            }
            self.publish(SessionState::Disconnected);
        }

        self.publish(SessionState::Connecting {
            wallet: name.to_string(),
        });

        match adapter.connect().await {
            Ok(address) => {
                *self.selected.lock() = Some((Arc::clone(&adapter), address));
                self.publish(SessionState::Connected {
                    wallet: name.to_string(),
                    address,
                });
                Ok(address)
            }
            Err(WalletError::Rejected) => {
                info!("Connection cancelled in the wallet extension");
                self.publish(SessionState::Disconnected);
                Err(TransferError::ConnectionCancelled)
            }
            Err(e) => {
                warn!(error = %e, "Wallet connection failed");
                self.publish(SessionState::Disconnected);
                Err(TransferError::Wallet(e.to_string()))
            }
        }
    }

    /// Disconnect the current wallet; a no-op when nothing is connected
    ///
    /// If the extension fails to disconnect, the session stays connected.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> TransferResult<()> {
        let _guard = SubmissionGuard::try_acquire(&self.busy)?;

        let current = self.selected.lock().clone();
        let Some((adapter, _)) = current else {
            return Ok(());
        };

        adapter
            .disconnect()
            .await
            .map_err(|e| TransferError::Wallet(e.to_string()))?;

        self.selected.lock().take();
        self.publish(SessionState::Disconnected);
        Ok(())
    }

    /// The extension reported a disconnect on its own
    pub fn on_external_disconnect(&self, wallet: &str) {
        let mut selected = self.selected.lock();
        let matches = selected
            .as_ref()
            .map(|(adapter, _)| adapter.name() == wallet)
            .unwrap_or(false);
        if matches {
            selected.take();
            drop(selected);
            warn!(wallet, "Wallet disconnected by the extension");
            self.publish(SessionState::Disconnected);
        }
    }

    /// Build the policy transfer for the connected wallet, let the wallet
    /// sign and broadcast it, then wait for confirmation
    #[instrument(skip_all)]
    pub async fn send_transfer(
        &self,
        builder: &TransferBuilder,
        submitter: &TransactionSubmitter,
    ) -> TransferResult<SubmissionReceipt> {
        let (adapter, address) = self.connected()?;
        let _guard = SubmissionGuard::try_acquire(&self.busy)?;

        let built = builder.build_for(address).await?;
        let signature = adapter.sign_and_send(built.transaction.clone()).await?;
        info!(%signature, wallet = adapter.name(), "Wallet broadcast transfer");

        let receipt = submitter
            .confirm(
                &signature,
                &built.blockhash,
                Some(built.last_valid_block_height),
            )
            .await?;

        Ok(SubmissionReceipt {
            signature: receipt.signature,
            message: format!("{}{}", TRANSFER_SUCCESS_PREFIX, receipt.signature),
        })
    }

    /// Same transfer routed through the relay endpoints: the relay builds,
    /// the wallet only signs, the relay broadcasts and confirms
    #[instrument(skip_all)]
    pub async fn send_via_relay(&self, relay: &RelayClient) -> TransferResult<SubmissionReceipt> {
        let (adapter, address) = self.connected()?;
        let _guard = SubmissionGuard::try_acquire(&self.busy)?;

        let created = relay.create_transaction(&address.to_string()).await?;
        let unsigned = decode_transaction(&created.transaction)?;
        let signed = adapter.sign_transaction(unsigned).await?;
        let encoded = encode_transaction(&signed)?;

        let confirmed = relay.confirm_transaction(encoded.as_str()).await?;
        let signature = Signature::from_str(&confirmed.signature).map_err(|e| {
            TransferError::Relay {
                status: 200,
                message: format!("relay returned an invalid signature: {}", e),
            }
        })?;

        Ok(SubmissionReceipt {
            signature,
            message: confirmed.message,
        })
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("wallets", &self.wallets.len())
            .field("state", &*self.state_tx.borrow())
            .field("busy", &self.is_busy())
            .finish()
    }
}
