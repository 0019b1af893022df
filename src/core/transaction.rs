// This file implements the transaction value - a transfer between two addresses
// A transaction's id is derived from its content, so two transactions with the
// same sender, receiver, amount, data and timestamp are the same transaction

use crate::core::monetary::{is_valid_amount, NETWORK_SENDER, REWARD_MEMO};
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, is_hex_digest, sha256_hex, to_canonical_json};
use log::debug;
use serde::{Deserialize, Serialize};

/// Produces signatures over a message (external signing service)
pub trait Signer {
    fn sign(&self, message: &[u8]) -> Result<String>;
}

/// Checks signatures produced by a [`Signer`]
pub trait SignatureVerifier {
    fn verify(&self, message: &[u8], signature: &str, public_key: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransactionRecord")]
pub struct Transaction {
    sender: String,
    receiver: String,
    amount: f64,
    data: String,
    timestamp: f64,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

// The wire form. Shape is validated on the way in but the carried id is kept
// as-is, so a transaction altered after hashing can still be detected.
#[derive(Deserialize)]
struct TransactionRecord {
    sender: String,
    receiver: String,
    amount: f64,
    #[serde(default)]
    data: String,
    timestamp: f64,
    id: String,
    #[serde(default)]
    signature: Option<String>,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = LedgerError;

    fn try_from(record: TransactionRecord) -> Result<Self> {
        Transaction::validate_fields(
            &record.sender,
            &record.receiver,
            record.amount,
            record.timestamp,
        )?;
        if !is_hex_digest(&record.id) {
            return Err(LedgerError::Validation(
                "Transaction ID must be a 64-character hex string".to_string(),
            ));
        }
        if matches!(&record.signature, Some(sig) if sig.is_empty()) {
            return Err(LedgerError::Validation(
                "Signature must not be empty".to_string(),
            ));
        }

        Ok(Transaction {
            sender: record.sender,
            receiver: record.receiver,
            amount: record.amount,
            data: record.data,
            timestamp: record.timestamp,
            id: record.id,
            signature: record.signature,
        })
    }
}

// Exactly the fields the id commits to
#[derive(Serialize)]
struct IdPreimage<'a> {
    sender: &'a str,
    receiver: &'a str,
    amount: f64,
    data: &'a str,
    timestamp: f64,
}

impl Transaction {
    /// Create a transaction stamped with the current time
    pub fn new(sender: &str, receiver: &str, amount: f64, data: &str) -> Result<Transaction> {
        Self::with_timestamp(sender, receiver, amount, data, current_timestamp()?)
    }

    /// Create a transaction with an explicit timestamp
    pub fn with_timestamp(
        sender: &str,
        receiver: &str,
        amount: f64,
        data: &str,
        timestamp: f64,
    ) -> Result<Transaction> {
        Self::validate_fields(sender, receiver, amount, timestamp)?;

        let mut tx = Transaction {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            data: data.to_string(),
            timestamp,
            id: String::new(),
            signature: None,
        };
        tx.id = tx.calculate_id()?;
        debug!("Created transaction {}", tx.short_id());
        Ok(tx)
    }

    /// Protocol-issued reward paying `amount` to `miner`
    pub fn new_reward(miner: &str, amount: f64, timestamp: f64) -> Result<Transaction> {
        Self::with_timestamp(NETWORK_SENDER, miner, amount, REWARD_MEMO, timestamp)
    }

    fn validate_fields(sender: &str, receiver: &str, amount: f64, timestamp: f64) -> Result<()> {
        if sender.is_empty() {
            return Err(LedgerError::Validation(
                "Sender address must be a non-empty string".to_string(),
            ));
        }
        if receiver.is_empty() {
            return Err(LedgerError::Validation(
                "Receiver address must be a non-empty string".to_string(),
            ));
        }
        if !is_valid_amount(amount) {
            return Err(LedgerError::Validation(format!(
                "Amount must be a positive number, got {amount}"
            )));
        }
        if !timestamp.is_finite() || timestamp <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "Timestamp must be a positive number, got {timestamp}"
            )));
        }
        Ok(())
    }

    /// SHA-256 over the canonical JSON of (sender, receiver, amount, data, timestamp)
    pub fn calculate_id(&self) -> Result<String> {
        let preimage = IdPreimage {
            sender: &self.sender,
            receiver: &self.receiver,
            amount: self.amount,
            data: &self.data,
            timestamp: self.timestamp,
        };
        Ok(sha256_hex(to_canonical_json(&preimage)?.as_bytes()))
    }

    /// Whether the carried id still matches the content
    pub fn has_valid_id(&self) -> bool {
        matches!(self.calculate_id(), Ok(id) if id == self.id)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == NETWORK_SENDER
    }

    /// Attach a signature over the id. A transaction can only be signed once.
    pub fn signed(mut self, signer: &dyn Signer) -> Result<Transaction> {
        if self.signature.is_some() {
            return Err(LedgerError::Signature(
                "Transaction is already signed".to_string(),
            ));
        }
        let signature = signer.sign(self.id.as_bytes())?;
        if signature.is_empty() {
            return Err(LedgerError::Signature(
                "Signer returned an empty signature".to_string(),
            ));
        }
        self.signature = Some(signature);
        debug!("Transaction {} signed", self.short_id());
        Ok(self)
    }

    pub fn verify_signature(&self, verifier: &dyn SignatureVerifier, public_key: &str) -> bool {
        match &self.signature {
            Some(signature) => verifier.verify(self.id.as_bytes(), signature, public_key),
            None => false,
        }
    }

    pub fn get_sender(&self) -> &str {
        &self.sender
    }

    pub fn get_receiver(&self) -> &str {
        &self.receiver
    }

    pub fn get_amount(&self) -> f64 {
        self.amount
    }

    pub fn get_data(&self) -> &str {
        &self.data
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// First eight characters of the id, for log lines
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(8)]
    }
}
