//! Transfer records and their canonical `sender-receiver-amount` text form.
//!
//! The canonical text is what the sender signs and what the miner hashes, so
//! [`format`] and [`parse`] must agree byte for byte. Amounts use the shortest
//! decimal rendering that parses back to the same `f64` (`3`, `0.1234567`,
//! `0.0000001`), never exponent notation.

use crate::crypto::{Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field delimiter of the canonical text.
pub const DELIMITER: char = '-';

/// Errors raised when decoding canonical transaction text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected two '-' delimiters in {0:?}")]
    MissingDelimiter(String),

    #[error("empty {0} id")]
    EmptyField(&'static str),

    #[error("invalid amount {0:?}")]
    InvalidAmount(String),
}

/// Render the canonical text for a transfer.
pub fn format(sender: &str, receiver: &str, amount: f64) -> String {
    format!("{sender}{DELIMITER}{receiver}{DELIMITER}{amount}")
}

/// Split canonical text on its first two delimiters.
///
/// Everything after the second delimiter is the amount, so a negative amount still
/// parses; the ledger rejects it at admission.
pub fn parse(text: &str) -> Result<(String, String, f64), ParseError> {
    let mut parts = text.splitn(3, DELIMITER);
    let (Some(sender), Some(receiver), Some(amount)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::MissingDelimiter(text.to_string()));
    };

    if sender.is_empty() {
        return Err(ParseError::EmptyField("sender"));
    }
    if receiver.is_empty() {
        return Err(ParseError::EmptyField("receiver"));
    }

    let value: f64 = amount
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidAmount(amount.to_string()))?;
    if !value.is_finite() {
        return Err(ParseError::InvalidAmount(amount.to_string()));
    }

    Ok((sender.to_string(), receiver.to_string(), value))
}

/// A signed transfer, immutable once admitted to the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sending account id.
    pub sender: String,
    /// Receiving account id.
    pub receiver: String,
    /// Value to transfer.
    pub amount: f64,
    /// Canonical text, exactly as signed.
    pub text: String,
    /// Sender's signature over `text`.
    pub signature: Signature,
}

impl Transaction {
    /// Build and sign a transfer.
    pub fn signed(sender: &str, receiver: &str, amount: f64, keypair: &Keypair) -> Self {
        let text = format(sender, receiver, amount);
        let signature = keypair.sign(text.as_bytes());
        Self {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            text,
            signature,
        }
    }

    /// Rebuild a transaction from submitted `(text, signature)`.
    ///
    /// The fields come from `text`; the original text is kept verbatim so the
    /// signature is always checked against what was actually signed.
    pub fn decode(text: &str, signature: Signature) -> Result<Self, ParseError> {
        let (sender, receiver, amount) = parse(text)?;
        Ok(Self {
            sender,
            receiver,
            amount,
            text: text.to_string(),
            signature,
        })
    }

    /// Verify the signature against the sender's public key.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        public_key.verify(self.text.as_bytes(), &self.signature)
    }
}
