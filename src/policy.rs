//! Address/amount policy
//!
//! The recipient and the transfer amount are fixed by policy and are not
//! user-supplied. Every build path (HTTP endpoint, wallet session) reads them
//! from here.

use serde::Serialize;
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};
use std::str::FromStr;

use crate::errors::{TransferError, TransferResult};

/// Recipient of every transfer
pub const RECIPIENT_ADDRESS: &str = "6RJW9Ybc1hX4iETDgqT33nUr1MA8vif8QgVBw6tXPDPj";

/// Amount moved by every transfer, in SOL
pub const AMOUNT_SOL: f64 = 0.001;

const PUBKEY_BYTES: usize = 32;

/// Fixed transfer terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPolicy {
    #[serde(serialize_with = "serialize_pubkey")]
    pub recipient: Pubkey,
    pub amount_sol: f64,
    pub lamports: u64,
}

impl TransferPolicy {
    pub fn new(recipient: Pubkey, amount_sol: f64) -> Self {
        Self {
            recipient,
            amount_sol,
            lamports: sol_to_lamports(amount_sol),
        }
    }

    /// Human-readable action label, e.g. `Send 0.001 SOL to 6RJW...PDPj`
    pub fn describe(&self) -> String {
        format!(
            "Send {} SOL to {}",
            self.amount_sol,
            format_address(&self.recipient.to_string(), 4)
        )
    }
}

impl Default for TransferPolicy {
    fn default() -> Self {
        // The constant is checked by `test_default_recipient_parses`
        let recipient = Pubkey::from_str(RECIPIENT_ADDRESS).unwrap_or_default();
        Self::new(recipient, AMOUNT_SOL)
    }
}

/// Convert a decimal SOL amount into lamports
pub fn sol_to_lamports(amount_sol: f64) -> u64 {
    (amount_sol * LAMPORTS_PER_SOL as f64).round() as u64
}

/// Parse and validate a base58 account address
pub fn parse_address(input: &str) -> TransferResult<Pubkey> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TransferError::InvalidAddress("empty address".to_string()));
    }

    let bytes = bs58::decode(trimmed)
        .into_vec()
        .map_err(|e| TransferError::InvalidAddress(format!("not base58: {}", e)))?;

    if bytes.len() != PUBKEY_BYTES {
        return Err(TransferError::InvalidAddress(format!(
            "expected {} bytes, got {}",
            PUBKEY_BYTES,
            bytes.len()
        )));
    }

    Pubkey::try_from(bytes.as_slice())
        .map_err(|e| TransferError::InvalidAddress(e.to_string()))
}

/// Shorten an address for display: first and last `length` characters
pub fn format_address(address: &str, length: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= length * 2 {
        return address.to_string();
    }
    let head: String = chars[..length].iter().collect();
    let tail: String = chars[chars.len() - length..].iter().collect();
    format!("{}...{}", head, tail)
}

fn serialize_pubkey<S: serde::Serializer>(key: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&key.to_string())
}
