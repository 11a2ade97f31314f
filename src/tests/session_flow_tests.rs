//! Wallet session transfer flows
//!
//! Connect a wallet, build the policy transfer, let the wallet sign and
//! broadcast, confirm through the workflow.

use std::sync::Arc;
use std::time::Duration;

use crate::errors::{TimeoutReason, TransferError};
use crate::policy::TransferPolicy;
use crate::rpc::ConfirmationStatus;
use crate::submission::{ConfirmPolicy, TransactionSubmitter};
use crate::test_utils::{MockChain, MockWallet};
use crate::tx_builder::TransferBuilder;
use crate::wallet::{SessionState, WalletAdapter, WalletSession, TRANSFER_SUCCESS_PREFIX};

struct Fixture {
    chain: Arc<MockChain>,
    wallet: Arc<MockWallet>,
    session: Arc<WalletSession>,
    builder: TransferBuilder,
    submitter: TransactionSubmitter,
}

fn fixture_with(wallet: MockWallet) -> Fixture {
    let chain = Arc::new(MockChain::new());
    let wallet = Arc::new(wallet.with_chain(chain.clone()));
    let session = Arc::new(WalletSession::new(vec![
        wallet.clone() as Arc<dyn WalletAdapter>
    ]));
    let builder = TransferBuilder::new(chain.clone(), TransferPolicy::default());
    let submitter = TransactionSubmitter::new(
        chain.clone(),
        ConfirmPolicy {
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
            max_poll_errors: 3,
        },
    );
    Fixture {
        chain,
        wallet,
        session,
        builder,
        submitter,
    }
}

fn fixture() -> Fixture {
    fixture_with(MockWallet::new("Phantom"))
}

#[tokio::test]
async fn test_transfer_requires_connected_wallet() {
    let f = fixture();
    let err = f
        .session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .unwrap_err();

    assert_eq!(err, TransferError::WalletNotConnected);
    assert_eq!(f.chain.blockhash_calls(), 0);
    assert_eq!(f.wallet.sign_calls(), 0);
}

#[tokio::test]
async fn test_connected_wallet_sends_policy_transfer() {
    let f = fixture();
    f.chain
        .script_statuses(vec![Ok(ConfirmationStatus::Confirmed)]);
    f.session.connect("Phantom").await.unwrap();

    let receipt = f
        .session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .unwrap();

    assert_eq!(
        receipt.message,
        format!("{}{}", TRANSFER_SUCCESS_PREFIX, receipt.signature)
    );

    let sent = f.chain.last_sent().unwrap();
    assert_eq!(sent.signatures[0], receipt.signature);
    assert_eq!(sent.message.account_keys[0], f.wallet.pubkey());
    assert!(sent
        .message
        .account_keys
        .contains(&TransferPolicy::default().recipient));
    assert!(!f.session.is_busy());
}

#[tokio::test]
async fn test_second_send_while_in_flight_is_busy() {
    let f = fixture();
    f.session.connect("Phantom").await.unwrap();
    f.chain
        .script_statuses(vec![Ok(ConfirmationStatus::Confirmed)]);
    f.chain.hold_statuses();

    let first = {
        let session = f.session.clone();
        let builder = f.builder.clone();
        let submitter = f.submitter.clone();
        tokio::spawn(async move { session.send_transfer(&builder, &submitter).await })
    };

    // Wait until the first transfer is broadcast and parked on confirmation
    while f.chain.sent_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(f.session.is_busy());

    let err = f
        .session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Busy);

    // Lifecycle changes are refused while a transfer is unresolved
    assert_eq!(f.session.disconnect().await.unwrap_err(), TransferError::Busy);
    assert!(f.session.state().is_connected());

    f.chain.release_statuses();
    let receipt = first.await.unwrap().unwrap();
    assert!(receipt.message.starts_with(TRANSFER_SUCCESS_PREFIX));
    assert_eq!(f.chain.sent_count(), 1);
    assert!(!f.session.is_busy());
}

#[tokio::test]
async fn test_transfer_during_disconnect_is_busy() {
    let f = fixture();
    f.session.connect("Phantom").await.unwrap();
    f.wallet.hold_disconnect();

    let disconnecting = {
        let session = f.session.clone();
        tokio::spawn(async move { session.disconnect().await })
    };

    // Wait until the extension is asked to disconnect and has not answered
    while f.wallet.disconnect_calls() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(f.session.is_busy());
    assert!(f.session.state().is_connected());

    let err = f
        .session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Busy);
    assert_eq!(f.chain.blockhash_calls(), 0);
    assert_eq!(f.wallet.sign_calls(), 0);
    assert_eq!(f.chain.sent_count(), 0);

    // A second lifecycle op is refused too
    assert_eq!(f.session.connect("Phantom").await.unwrap_err(), TransferError::Busy);

    f.wallet.release_disconnect();
    disconnecting.await.unwrap().unwrap();
    assert_eq!(f.session.state(), SessionState::Disconnected);
    assert!(!f.session.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_expired_blockhash_times_out_and_frees_session() {
    let f = fixture();
    f.session.connect("Phantom").await.unwrap();
    f.chain
        .set_block_height(f.chain.last_valid_block_height() + 1);

    let err = f
        .session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::ConfirmationTimeout {
            reason: TimeoutReason::BlockhashExpired,
            ..
        }
    ));

    // A terminal outcome releases the busy guard
    assert!(!f.session.is_busy());
    f.chain.set_block_height(crate::test_utils::MOCK_BLOCK_HEIGHT);
    f.chain
        .script_statuses(vec![Ok(ConfirmationStatus::Confirmed)]);
    assert!(f
        .session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_transfer_hits_deadline() {
    let f = fixture();
    f.session.connect("Phantom").await.unwrap();

    let err = f
        .session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::ConfirmationTimeout {
            reason: TimeoutReason::Deadline,
            ..
        }
    ));
}

#[tokio::test]
async fn test_rejected_signature_sends_nothing() {
    let f = fixture_with(MockWallet::new("Phantom").rejecting_signature());
    f.session.connect("Phantom").await.unwrap();

    let err = f
        .session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Wallet(_)));
    assert_eq!(f.chain.sent_count(), 0);
    assert!(!f.session.is_busy());
}

#[tokio::test]
async fn test_node_rejection_through_wallet_is_submission_error() {
    let f = fixture();
    f.chain
        .fail_send(TransferError::Submission("insufficient funds".into()));
    f.session.connect("Phantom").await.unwrap();

    let err = f
        .session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Submission(_)));
    assert_eq!(f.chain.status_calls(), 0);
}

#[tokio::test]
async fn test_external_disconnect_blocks_further_transfers() {
    let f = fixture();
    let mut states = f.session.subscribe();
    f.session.connect("Phantom").await.unwrap();
    assert_eq!(states.borrow_and_update().address(), Some(f.wallet.pubkey()));

    f.session.on_external_disconnect("Phantom");
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SessionState::Disconnected);

    assert_eq!(
        f.session
            .send_transfer(&f.builder, &f.submitter)
            .await
            .unwrap_err(),
        TransferError::WalletNotConnected
    );
}

#[tokio::test]
async fn test_signer_is_the_connected_wallet() {
    let f = fixture();
    f.chain
        .script_statuses(vec![Ok(ConfirmationStatus::Confirmed)]);
    let address = f.session.connect("Phantom").await.unwrap();
    f.session
        .send_transfer(&f.builder, &f.submitter)
        .await
        .unwrap();

    let sent = f.chain.last_sent().unwrap();
    assert!(sent.verify().is_ok());
    assert_eq!(sent.message.account_keys[0], address);
    assert_eq!(f.wallet.sign_calls(), 1);
}
