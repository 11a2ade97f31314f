//! Test Utilities Module
//!
//! Scripted stand-ins for the blockchain node and for wallet extensions, so
//! the transfer pipeline can be exercised without network access.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::Transaction,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::errors::{TransferError, TransferResult};
use crate::policy::TransferPolicy;
use crate::rpc::{ChainClient, ConfirmationStatus};
use crate::wallet::{WalletAdapter, WalletError, WalletReadyState};

/// Block height the mock node reports by default
pub const MOCK_BLOCK_HEIGHT: u64 = 300_000;
/// Last valid block height attached to the mock blockhash
pub const MOCK_LAST_VALID_BLOCK_HEIGHT: u64 = 300_150;

/// Scripted blockchain node
///
/// Defaults: every blockhash request succeeds, broadcasts of correctly signed
/// transactions succeed, status polls report `Pending` once the script is
/// exhausted, and the blockhash stays valid.
#[derive(Debug)]
pub struct MockChain {
    blockhash: Hash,
    blockhash_error: Mutex<Option<TransferError>>,
    send_error: Mutex<Option<TransferError>>,
    statuses: Mutex<VecDeque<TransferResult<ConfirmationStatus>>>,
    sent: Mutex<Vec<Transaction>>,
    blockhash_valid: AtomicBool,
    block_height: AtomicU64,
    blockhash_calls: AtomicUsize,
    status_calls: AtomicUsize,
    status_gate: watch::Sender<bool>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        let (status_gate, _) = watch::channel(true);
        Self {
            blockhash: Hash::new_unique(),
            blockhash_error: Mutex::new(None),
            send_error: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            blockhash_valid: AtomicBool::new(true),
            block_height: AtomicU64::new(MOCK_BLOCK_HEIGHT),
            blockhash_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            status_gate,
        }
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn last_valid_block_height(&self) -> u64 {
        MOCK_LAST_VALID_BLOCK_HEIGHT
    }

    pub fn blockhash_calls(&self) -> usize {
        self.blockhash_calls.load(Ordering::SeqCst)
    }

    pub fn fail_blockhash(&self, err: TransferError) {
        *self.blockhash_error.lock() = Some(err);
    }

    pub fn fail_send(&self, err: TransferError) {
        *self.send_error.lock() = Some(err);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn last_sent(&self) -> Option<Transaction> {
        self.sent.lock().last().cloned()
    }

    /// Queue status poll results, consumed in order
    pub fn script_statuses(&self, statuses: Vec<TransferResult<ConfirmationStatus>>) {
        self.statuses.lock().extend(statuses);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn set_blockhash_valid(&self, valid: bool) {
        self.blockhash_valid.store(valid, Ordering::SeqCst);
    }

    pub fn set_block_height(&self, height: u64) {
        self.block_height.store(height, Ordering::SeqCst);
    }

    /// Make status polls wait until [`release_statuses`](Self::release_statuses)
    pub fn hold_statuses(&self) {
        self.status_gate.send_replace(false);
    }

    pub fn release_statuses(&self) {
        self.status_gate.send_replace(true);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn latest_blockhash(&self) -> TransferResult<(Hash, u64)> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.blockhash_error.lock().clone() {
            return Err(err);
        }
        Ok((self.blockhash, MOCK_LAST_VALID_BLOCK_HEIGHT))
    }

    async fn send_transaction(&self, tx: &Transaction) -> TransferResult<Signature> {
        if let Some(err) = self.send_error.lock().clone() {
            return Err(err);
        }
        if tx.verify().is_err() {
            return Err(TransferError::Submission(
                "Transaction signature verification failure".to_string(),
            ));
        }
        self.sent.lock().push(tx.clone());
        Ok(tx.signatures[0])
    }

    async fn signature_status(&self, _signature: &Signature) -> TransferResult<ConfirmationStatus> {
        let mut gate = self.status_gate.subscribe();
        // Sender lives in self, so the channel cannot close here
        let _ = gate.wait_for(|open| *open).await;

        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .pop_front()
            .unwrap_or(Ok(ConfirmationStatus::Pending))
    }

    async fn block_height(&self) -> TransferResult<u64> {
        Ok(self.block_height.load(Ordering::SeqCst))
    }

    async fn is_blockhash_valid(&self, _blockhash: &Hash) -> TransferResult<bool> {
        Ok(self.blockhash_valid.load(Ordering::SeqCst))
    }

    fn endpoint(&self) -> &str {
        "mock://chain"
    }
}

/// Transfer of the policy amount to the policy recipient, signed by `payer`
pub fn signed_transfer_from(payer: &Keypair, blockhash: Hash) -> Transaction {
    let policy = TransferPolicy::default();
    let ix = system_instruction::transfer(&payer.pubkey(), &policy.recipient, policy.lamports);
    Transaction::new_signed_with_payer(&[ix], Some(&payer.pubkey()), &[payer], blockhash)
}

/// Same as [`signed_transfer_from`] with a fresh payer
pub fn signed_transfer(blockhash: Hash) -> Transaction {
    signed_transfer_from(&Keypair::new(), blockhash)
}

/// Wallet extension stand-in holding its own keypair
#[derive(Debug)]
pub struct MockWallet {
    name: String,
    keypair: Keypair,
    ready_state: WalletReadyState,
    reject_connect: bool,
    fail_disconnect: bool,
    reject_signature: bool,
    chain: Option<Arc<MockChain>>,
    disconnect_gate: watch::Sender<bool>,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    sign_calls: AtomicUsize,
}

impl MockWallet {
    pub fn new(name: &str) -> Self {
        let (disconnect_gate, _) = watch::channel(true);
        Self {
            name: name.to_string(),
            keypair: Keypair::new(),
            ready_state: WalletReadyState::Installed,
            reject_connect: false,
            fail_disconnect: false,
            reject_signature: false,
            chain: None,
            disconnect_gate,
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_ready_state(mut self, state: WalletReadyState) -> Self {
        self.ready_state = state;
        self
    }

    /// Broadcast through `chain` on `sign_and_send`
    pub fn with_chain(mut self, chain: Arc<MockChain>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn rejecting_connect(mut self) -> Self {
        self.reject_connect = true;
        self
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn rejecting_signature(mut self) -> Self {
        self.reject_signature = true;
        self
    }

    /// Make `disconnect` wait until [`release_disconnect`](Self::release_disconnect)
    pub fn hold_disconnect(&self) {
        self.disconnect_gate.send_replace(false);
    }

    pub fn release_disconnect(&self) {
        self.disconnect_gate.send_replace(true);
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    fn sign(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_signature {
            return Err(WalletError::Rejected);
        }
        let blockhash = tx.message.recent_blockhash;
        tx.try_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(tx)
    }
}

#[async_trait]
impl WalletAdapter for MockWallet {
    fn name(&self) -> &str {
        &self.name
    }

    fn ready_state(&self) -> WalletReadyState {
        self.ready_state
    }

    async fn connect(&self) -> Result<Pubkey, WalletError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_connect {
            return Err(WalletError::Rejected);
        }
        Ok(self.keypair.pubkey())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.disconnect_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if self.fail_disconnect {
            return Err(WalletError::Other("extension did not respond".to_string()));
        }
        Ok(())
    }

    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        self.sign(tx)
    }

    async fn sign_and_send(&self, tx: Transaction) -> Result<Signature, WalletError> {
        let signed = self.sign(tx)?;
        match &self.chain {
            Some(chain) => chain
                .send_transaction(&signed)
                .await
                .map_err(|e| WalletError::Send(e.to_string())),
            None => Ok(signed.signatures[0]),
        }
    }
}
