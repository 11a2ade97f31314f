//! Error taxonomy for the transfer pipeline
//!
//! Every failure that can surface from building, encoding, submitting or
//! confirming a transfer, or from driving a wallet session, is one of the
//! variants below. Errors are:
//! - Classified: each variant maps to a stable metrics/log category
//! - Actionable: `is_retryable()` tells the caller whether the same request
//!   may succeed later
//! - Verbatim: the `Display` text is what the HTTP layer and session callers
//!   hand back to the user

use solana_client::client_error::{ClientError, ClientErrorKind};
use thiserror::Error;

/// Comprehensive error type for the transfer pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Address failed base58/length validation
    ///
    /// User-correctable: the caller supplied a bad sender address.
    #[error("Invalid sender public key: {0}")]
    InvalidAddress(String),

    /// The RPC node could not be reached or did not answer
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Encoded or decoded transaction does not match the wire layout
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    /// The node rejected the broadcast (preflight failure, insufficient
    /// funds, duplicate, unknown blockhash)
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// The transaction landed but program execution failed
    #[error("Transaction failed: {0}")]
    OnChainExecution(String),

    /// Confirmation was not observed within the validity window or the
    /// explicit deadline. The outcome is ambiguous: query the node before
    /// resubmitting.
    #[error("Confirmation timed out for {signature}: {reason}")]
    ConfirmationTimeout {
        /// Signature that was broadcast
        signature: String,
        /// Why waiting stopped
        reason: TimeoutReason,
    },

    /// Another submission is already in flight for this session
    #[error("A transaction is already in flight for this wallet session")]
    Busy,

    /// The caller stopped waiting. The broadcast may still land.
    #[error("Confirmation wait abandoned for {signature}")]
    Abandoned {
        /// Signature that was broadcast
        signature: String,
    },

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// User dismissed the extension's approval prompt
    #[error("Connection request was cancelled by the user")]
    ConnectionCancelled,

    /// Any other failure reported by the wallet extension
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Relay endpoint answered with an error body or an unexpected payload
    #[error("Relay error (status={status}): {message}")]
    Relay {
        /// HTTP status returned by the relay, 0 when no response arrived
        status: u16,
        message: String,
    },
}

/// Reason a confirmation wait ended without a final status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutReason {
    /// The recent blockhash embedded in the transaction is no longer valid
    BlockhashExpired,
    /// The configured wait deadline passed
    Deadline,
}

impl std::fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockhashExpired => write!(f, "blockhash expired"),
            Self::Deadline => write!(f, "deadline exceeded"),
        }
    }
}

/// Which network round trip produced a client error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcStage {
    Blockhash,
    Broadcast,
    Status,
}

impl TransferError {
    /// Check if this error is potentially retryable
    ///
    /// Returns `true` if the same request may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkUnavailable(_) => true,
            Self::Busy => true,
            Self::Relay { status, .. } => *status == 0 || *status >= 500,

            Self::InvalidAddress(_) => false,
            Self::MalformedTransaction(_) => false,
            // The blockhash may already be consumed
            Self::Submission(_) => false,
            Self::OnChainExecution(_) => false,
            // Ambiguous: the caller has to look the signature up first
            Self::ConfirmationTimeout { .. } => false,
            Self::Abandoned { .. } => false,
            Self::WalletNotConnected => false,
            Self::WalletNotFound(_) => false,
            Self::ConnectionCancelled => false,
            Self::Wallet(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "invalid_address",
            Self::NetworkUnavailable(_) => "network",
            Self::MalformedTransaction(_) => "malformed",
            Self::Submission(_) => "submission",
            Self::OnChainExecution(_) => "execution",
            Self::ConfirmationTimeout { .. } => "timeout",
            Self::Busy => "busy",
            Self::Abandoned { .. } => "abandoned",
            Self::WalletNotConnected | Self::WalletNotFound(_) => "wallet_state",
            Self::ConnectionCancelled => "cancelled",
            Self::Wallet(_) => "wallet",
            Self::Relay { .. } => "relay",
        }
    }

    /// True for errors the user can fix by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidAddress(_))
    }

    /// Classify a `ClientError` raised during the given round trip
    ///
    /// Transport failures (I/O, HTTP) mean the node was never heard from.
    /// Anything the node answered during broadcast is a rejection.
    pub fn from_client_error(err: ClientError, stage: RpcStage) -> Self {
        let transport = matches!(
            err.kind(),
            ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_)
        );
        let message = err.to_string();

        if transport {
            return Self::NetworkUnavailable(message);
        }

        match stage {
            RpcStage::Broadcast => Self::Submission(message),
            // Reads carry no user input, so any failure means the node is unusable
            RpcStage::Blockhash | RpcStage::Status => {
                Self::NetworkUnavailable(format!("unexpected RPC response: {}", message))
            }
        }
    }

    pub fn confirmation_timeout(signature: impl ToString, reason: TimeoutReason) -> Self {
        Self::ConfirmationTimeout {
            signature: signature.to_string(),
            reason,
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedTransaction(reason.into())
    }
}

pub type TransferResult<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransferError::OnChainExecution("InstructionError(0, Custom(1))".to_string());
        assert_eq!(
            err.to_string(),
            "Transaction failed: InstructionError(0, Custom(1))"
        );

        let err = TransferError::confirmation_timeout("abc", TimeoutReason::BlockhashExpired);
        assert_eq!(
            err.to_string(),
            "Confirmation timed out for abc: blockhash expired"
        );
    }

    #[test]
    fn test_error_retryability() {
        assert!(TransferError::NetworkUnavailable("down".to_string()).is_retryable());
        assert!(TransferError::Busy.is_retryable());
        assert!(TransferError::Relay {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_retryable());

        assert!(!TransferError::Submission("duplicate".to_string()).is_retryable());
        assert!(!TransferError::OnChainExecution("x".to_string()).is_retryable());
        assert!(!TransferError::confirmation_timeout("s", TimeoutReason::Deadline).is_retryable());
        assert!(!TransferError::Relay {
            status: 400,
            message: "bad".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(TransferError::Busy.category(), "busy");
        assert_eq!(
            TransferError::malformed("bad base64").category(),
            "malformed"
        );
        assert_eq!(TransferError::WalletNotConnected.category(), "wallet_state");
    }

    #[test]
    fn test_transport_errors_are_network_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = TransferError::from_client_error(ClientError::from(io), RpcStage::Broadcast);
        assert!(matches!(err, TransferError::NetworkUnavailable(_)));
    }

    #[test]
    fn test_broadcast_rejection_is_submission_error() {
        let client_err = ClientError::from(ClientErrorKind::Custom(
            "Transaction simulation failed: insufficient lamports".to_string(),
        ));
        let err = TransferError::from_client_error(client_err, RpcStage::Broadcast);
        assert!(matches!(err, TransferError::Submission(_)));
        assert!(!err.is_retryable());
    }
}
