//! Ledger simulation for tallychain.
//!
//! This crate brings the core primitives together into a single-process ledger:
//! - **Ledger**: accounts, balances and admission control
//! - **Account**: actors that sign transfers and supply mining nonces
//! - **Mempool**: transactions admitted but not yet settled
//! - **Miner**: bounded nonce search against a digest pattern
//!
//! # Example
//!
//! ```rust,no_run
//! use tallychain_chain::Ledger;
//!
//! let mut ledger = Ledger::new();
//! let alice = ledger.register("alice").unwrap();
//! let bob = ledger.register("bob").unwrap();
//!
//! assert!(alice.request_transfer(&mut ledger, bob.id(), 3.0).unwrap());
//! let nonce = ledger.settle().unwrap();
//!
//! println!("settled with nonce {nonce}");
//! println!("{ledger}");
//! ```

pub mod account;
pub mod ledger;
pub mod mempool;
pub mod miner;

// Re-export commonly used types
pub use account::Account;
pub use ledger::{Ledger, LedgerConfig, LedgerError, Rejection, SettlementPolicy, SettlementReceipt};
pub use mempool::{Mempool, MempoolConfig, MempoolError, MempoolStats};
pub use miner::{DifficultyRule, MiningConfig, SearchStop, Solution};
