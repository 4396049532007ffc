//! Pending transaction pool.
//!
//! The pool keeps admitted transactions in admission order until the next
//! settlement drains it. Admission checks (signature, balance) happen in the
//! ledger before a transaction reaches the pool.

use std::collections::HashSet;
use tallychain_core::Transaction;
use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("pending pool is full (capacity: {0})")]
    MempoolFull(usize),
}

pub type Result<T> = std::result::Result<T, MempoolError>;

/// Configuration for the pending pool.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of pending transactions.
    pub max_transactions: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 10_000,
        }
    }
}

/// Ordered pool of transactions awaiting settlement.
#[derive(Debug, Default)]
pub struct Mempool {
    config: MempoolConfig,
    transactions: Vec<Transaction>,
}

impl Mempool {
    /// Create a new pool with default configuration.
    pub fn new() -> Self {
        Self::with_config(MempoolConfig::default())
    }

    /// Create a new pool with the given configuration.
    pub fn with_config(config: MempoolConfig) -> Self {
        Self {
            config,
            transactions: Vec::new(),
        }
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Append a transaction at the back of the pool.
    pub fn add(&mut self, tx: Transaction) -> Result<()> {
        if self.transactions.len() >= self.config.max_transactions {
            return Err(MempoolError::MempoolFull(self.config.max_transactions));
        }
        self.transactions.push(tx);
        Ok(())
    }

    /// Pending transactions in admission order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The mining payload: every pending canonical text, concatenated in order.
    pub fn payload(&self) -> String {
        self.transactions.iter().map(|tx| tx.text.as_str()).collect()
    }

    /// Remove and return every pending transaction, oldest first.
    pub fn drain(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    /// Get pool statistics.
    pub fn stats(&self) -> MempoolStats {
        let unique_senders: HashSet<&str> =
            self.transactions.iter().map(|tx| tx.sender.as_str()).collect();
        MempoolStats {
            total_transactions: self.len(),
            unique_senders: unique_senders.len(),
            pending_amount: self.transactions.iter().map(|tx| tx.amount).sum(),
            capacity: self.config.max_transactions,
        }
    }
}

/// Pool statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MempoolStats {
    /// Total number of transactions.
    pub total_transactions: usize,
    /// Number of unique senders.
    pub unique_senders: usize,
    /// Sum of all pending amounts.
    pub pending_amount: f64,
    /// Pool capacity.
    pub capacity: usize,
}
