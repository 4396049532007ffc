//! The ledger: accounts, balances, the pending pool and settlement.
//!
//! All mutation goes through `&mut Ledger`, so a single owner has exclusive access
//! for the whole of `submit` and `settle`. Callers that share a ledger across threads
//! wrap it in a `Mutex` and hold the guard for each call.

use crate::account::Account;
use crate::mempool::{Mempool, MempoolConfig, MempoolError, MempoolStats};
use crate::miner::{self, MiningConfig, SearchStop};
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tallychain_core::transaction::DELIMITER;
use tallychain_core::{Hash, ParseError, Signature, Transaction};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid account id {0:?} (must be non-empty and contain no '-')")]
    InvalidAccountId(String),

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("no pending transactions to settle")]
    EmptyPool,

    #[error("mining timed out after {attempts} attempts")]
    MiningTimeout { attempts: u64 },

    #[error("mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<SearchStop> for LedgerError {
    fn from(stop: SearchStop) -> Self {
        match stop {
            SearchStop::Exhausted { attempts } | SearchStop::DeadlineElapsed { attempts } => {
                LedgerError::MiningTimeout { attempts }
            }
            SearchStop::Cancelled { attempts } => LedgerError::MiningCancelled { attempts },
        }
    }
}

/// Why a submitted transaction was not admitted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Rejection {
    #[error("malformed transaction: {0}")]
    Malformed(#[from] ParseError),

    #[error("unknown sender: {0}")]
    UnknownSender(String),

    #[error("unknown receiver: {0}")]
    UnknownReceiver(String),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(f64),

    #[error("insufficient balance (required {required}, available {available})")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("signature verification failed")]
    InvalidSignature,

    #[error(transparent)]
    PoolFull(#[from] MempoolError),
}

/// Whether settlement re-checks balances when applying pending transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SettlementPolicy {
    /// Apply everything admitted. A sender whose pending transfers together exceed
    /// the balance seen at admission ends up negative.
    #[default]
    Trusting,
    /// Skip, and drop from the pool, any transaction the sender can no longer cover
    /// at apply time.
    Revalidate,
}

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Balance credited to every newly registered account.
    pub starting_balance: f64,
    /// Paid to the account whose nonce solves the pool.
    pub mining_reward: f64,
    pub settlement: SettlementPolicy,
    pub mining: MiningConfig,
    pub mempool: MempoolConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 5.0,
            mining_reward: 6.25,
            settlement: SettlementPolicy::default(),
            mining: MiningConfig::default(),
            mempool: MempoolConfig::default(),
        }
    }
}

/// Outcome of a successful settlement.
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    /// The winning nonce.
    pub nonce: u64,
    /// Digest of the pool payload followed by the nonce.
    pub digest: Hash,
    /// Account credited with the reward.
    pub miner: String,
    pub reward: f64,
    /// Candidates tried, including the winner.
    pub attempts: u64,
    /// Transactions applied, in admission order.
    pub applied: Vec<Transaction>,
    /// Transactions dropped at apply time (only under [`SettlementPolicy::Revalidate`]).
    pub skipped: Vec<Transaction>,
}

struct Entry {
    account: Arc<Account>,
    balance: f64,
}

/// Authoritative store of accounts, balances and pending transfers.
pub struct Ledger {
    config: LedgerConfig,
    /// Accounts in registration order.
    entries: Vec<Entry>,
    /// Account id to position in `entries`.
    index: HashMap<String, usize>,
    mempool: Mempool,
}

impl Ledger {
    /// Create an empty ledger with default configuration.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    /// Create an empty ledger with the given configuration.
    pub fn with_config(config: LedgerConfig) -> Self {
        let mempool = Mempool::with_config(config.mempool.clone());
        Self {
            config,
            entries: Vec::new(),
            index: HashMap::new(),
            mempool,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Number of registered accounts.
    pub fn account_count(&self) -> usize {
        self.entries.len()
    }

    /// Register a new account under `id_hint`, or under `id_hint` plus a random
    /// numeric suffix if that id is taken.
    pub fn register(&mut self, id_hint: &str) -> Result<Arc<Account>> {
        if id_hint.is_empty() || id_hint.contains(DELIMITER) {
            return Err(LedgerError::InvalidAccountId(id_hint.to_string()));
        }

        let id = self.unique_id(id_hint);
        let account = Arc::new(Account::new(id.clone()));
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(Entry {
            account: Arc::clone(&account),
            balance: self.config.starting_balance,
        });

        info!(id = %id, balance = self.config.starting_balance, "registered account");
        Ok(account)
    }

    fn unique_id(&self, id_hint: &str) -> String {
        if !self.index.contains_key(id_hint) {
            return id_hint.to_string();
        }

        let mut rng = rand::thread_rng();
        let (mut low, mut high) = (1_000u64, 9_999u64);
        let mut draws = 0u32;
        loop {
            let candidate = format!("{}{}", id_hint, rng.gen_range(low..=high));
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
            draws += 1;
            // Widen the suffix range once the current one is crowded.
            if draws % 100 == 0 {
                low = low.saturating_mul(10);
                high = high.saturating_mul(10).saturating_add(9);
            }
        }
    }

    /// Exact-match lookup by id.
    pub fn find(&self, id: &str) -> Option<Arc<Account>> {
        self.entry(id).map(|entry| Arc::clone(&entry.account))
    }

    /// Settled balance of `id`.
    pub fn balance_of(&self, id: &str) -> Result<f64> {
        self.entry(id)
            .map(|entry| entry.balance)
            .ok_or_else(|| LedgerError::UnknownAccount(id.to_string()))
    }

    /// Sum of all balances.
    pub fn total_balance(&self) -> f64 {
        self.entries.iter().map(|entry| entry.balance).sum()
    }

    /// Every `(id, balance)` pair in registration order.
    pub fn dump_balances(&self) -> Vec<(String, f64)> {
        self.entries
            .iter()
            .map(|entry| (entry.account.id().to_string(), entry.balance))
            .collect()
    }

    fn entry(&self, id: &str) -> Option<&Entry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| LedgerError::UnknownAccount(id.to_string()))
    }

    /// Admit `(text, signature)` to the pending pool. Returns false on any rejection.
    pub fn submit(&mut self, text: &str, signature: &Signature) -> bool {
        match self.try_submit(text, signature) {
            Ok(()) => true,
            Err(reason) => {
                debug!(%reason, text, "transaction rejected");
                false
            }
        }
    }

    /// Admit `(text, signature)` to the pending pool, reporting why it was rejected.
    ///
    /// The balance check is against the settled balance only; other pending
    /// transfers from the same sender are not subtracted.
    pub fn try_submit(
        &mut self,
        text: &str,
        signature: &Signature,
    ) -> std::result::Result<(), Rejection> {
        let tx = Transaction::decode(text, *signature)?;

        let sender = self
            .entry(&tx.sender)
            .ok_or_else(|| Rejection::UnknownSender(tx.sender.clone()))?;
        if self.entry(&tx.receiver).is_none() {
            return Err(Rejection::UnknownReceiver(tx.receiver.clone()));
        }
        if tx.amount <= 0.0 {
            return Err(Rejection::InvalidAmount(tx.amount));
        }
        if tx.amount > sender.balance {
            return Err(Rejection::InsufficientBalance {
                required: tx.amount,
                available: sender.balance,
            });
        }
        if !tx.verify(sender.account.public_key()) {
            return Err(Rejection::InvalidSignature);
        }

        self.mempool.add(tx)?;
        debug!(text, pending = self.mempool.len(), "transaction admitted");
        Ok(())
    }

    /// Pending transactions in admission order.
    pub fn pending(&self) -> &[Transaction] {
        self.mempool.transactions()
    }

    /// Statistics about the pending pool.
    pub fn pool_stats(&self) -> MempoolStats {
        self.mempool.stats()
    }

    /// Mine and settle the pending pool, returning the winning nonce.
    pub fn settle(&mut self) -> Result<u64> {
        self.mine().map(|receipt| receipt.nonce)
    }

    /// Mine and settle the pending pool.
    pub fn mine(&mut self) -> Result<SettlementReceipt> {
        self.mine_inner(None)
    }

    /// Like [`Ledger::mine`], but stops with [`LedgerError::MiningCancelled`] once
    /// `cancel` is set. The pool is left untouched in that case.
    pub fn mine_cancellable(&mut self, cancel: &AtomicBool) -> Result<SettlementReceipt> {
        self.mine_inner(Some(cancel))
    }

    fn mine_inner(&mut self, cancel: Option<&AtomicBool>) -> Result<SettlementReceipt> {
        if self.mempool.is_empty() {
            return Err(LedgerError::EmptyPool);
        }

        // Resolve every party up front: nothing after the drain may fail.
        let parties = self
            .mempool
            .transactions()
            .iter()
            .map(|tx| -> Result<(usize, usize)> {
                Ok((self.index_of(&tx.sender)?, self.index_of(&tx.receiver)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let payload = self.mempool.payload();
        let solution = miner::search(&payload, parties.len(), &self.config.mining, cancel, |i| {
            self.entries[parties[i].0].account.next_nonce_candidate()
        })
        .map_err(|stop| {
            warn!(%stop, pending = parties.len(), "settlement aborted");
            LedgerError::from(stop)
        })?;

        let winner = parties[solution.miner_index].0;
        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        for (tx, (sender, receiver)) in self.mempool.drain().into_iter().zip(parties) {
            if self.config.settlement == SettlementPolicy::Revalidate
                && self.entries[sender].balance < tx.amount
            {
                debug!(sender = %tx.sender, amount = tx.amount, "dropping overdrawn transaction");
                skipped.push(tx);
                continue;
            }
            self.entries[sender].balance -= tx.amount;
            self.entries[receiver].balance += tx.amount;
            applied.push(tx);
        }

        let reward = self.config.mining_reward;
        self.entries[winner].balance += reward;
        let miner = self.entries[winner].account.id().to_string();

        info!(
            nonce = solution.nonce,
            miner = %miner,
            attempts = solution.attempts,
            applied = applied.len(),
            skipped = skipped.len(),
            "pool settled"
        );

        Ok(SettlementReceipt {
            nonce: solution.nonce,
            digest: solution.digest,
            miner,
            reward,
            attempts: solution.attempts,
            applied,
            skipped,
        })
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "*".repeat(20);
        writeln!(f, "{rule}")?;
        for (id, balance) in self.dump_balances() {
            writeln!(f, "{id} : {balance}")?;
        }
        write!(f, "{rule}")
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("accounts", &self.entries.len())
            .field("pending", &self.mempool.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::DifficultyRule;
    use std::sync::atomic::Ordering;

    fn unsolvable() -> LedgerConfig {
        LedgerConfig {
            mining: MiningConfig {
                max_attempts: 50,
                difficulty: DifficultyRule {
                    digit_window: 10,
                    zero_run: 11,
                },
                ..MiningConfig::default()
            },
            ..LedgerConfig::default()
        }
    }

    #[test]
    fn test_register_starting_balance() {
        let mut ledger = Ledger::new();
        let alice = ledger.register("alice").unwrap();
        assert_eq!(alice.id(), "alice");
        assert_eq!(ledger.balance_of("alice").unwrap(), 5.0);
    }

    #[test]
    fn test_register_collision_suffix() {
        let mut ledger = Ledger::new();
        let first = ledger.register("alice").unwrap();
        let second = ledger.register("alice").unwrap();

        assert_ne!(first.id(), second.id());
        let suffix = second.id().strip_prefix("alice").unwrap();
        let n: u64 = suffix.parse().unwrap();
        assert!((1000..=9999).contains(&n));
        assert_eq!(ledger.account_count(), 2);
    }

    #[test]
    fn test_register_rejects_bad_ids() {
        let mut ledger = Ledger::new();
        assert!(matches!(
            ledger.register("al-ice"),
            Err(LedgerError::InvalidAccountId(_))
        ));
        assert!(matches!(ledger.register(""), Err(LedgerError::InvalidAccountId(_))));
        assert_eq!(ledger.account_count(), 0);
    }

    #[test]
    fn test_find_is_exact() {
        let mut ledger = Ledger::new();
        ledger.register("alice").unwrap();
        assert!(ledger.find("alice").is_some());
        assert!(ledger.find("ali").is_none());
        assert!(ledger.find("alice2").is_none());
    }

    #[test]
    fn test_balance_of_unknown() {
        let ledger = Ledger::new();
        assert!(matches!(
            ledger.balance_of("nobody"),
            Err(LedgerError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_try_submit_rejections() {
        let mut ledger = Ledger::new();
        let alice = ledger.register("alice").unwrap();
        let bob = ledger.register("bob").unwrap();

        let text = "alice-bob-1";
        assert!(matches!(
            ledger.try_submit("garbage", &alice.sign("garbage")),
            Err(Rejection::Malformed(_))
        ));
        assert_eq!(
            ledger.try_submit("carol-bob-1", &alice.sign("carol-bob-1")),
            Err(Rejection::UnknownSender("carol".to_string()))
        );
        assert_eq!(
            ledger.try_submit("alice-carol-1", &alice.sign("alice-carol-1")),
            Err(Rejection::UnknownReceiver("carol".to_string()))
        );
        assert_eq!(
            ledger.try_submit("alice-bob-0", &alice.sign("alice-bob-0")),
            Err(Rejection::InvalidAmount(0.0))
        );
        assert_eq!(
            ledger.try_submit("alice-bob-9", &alice.sign("alice-bob-9")),
            Err(Rejection::InsufficientBalance {
                required: 9.0,
                available: 5.0
            })
        );
        assert_eq!(
            ledger.try_submit(text, &bob.sign(text)),
            Err(Rejection::InvalidSignature)
        );
        assert!(ledger.pending().is_empty());

        assert_eq!(ledger.try_submit(text, &alice.sign(text)), Ok(()));
        assert_eq!(ledger.pending().len(), 1);
    }

    #[test]
    fn test_submit_rejects_negative_amount() {
        let mut ledger = Ledger::new();
        let alice = ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();

        let text = "alice-bob--2";
        assert!(!ledger.submit(text, &alice.sign(text)));
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn test_submit_pool_full() {
        let mut ledger = Ledger::with_config(LedgerConfig {
            mempool: MempoolConfig {
                max_transactions: 1,
            },
            ..LedgerConfig::default()
        });
        let alice = ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();

        assert!(alice.request_transfer(&mut ledger, "bob", 1.0).unwrap());
        let text = "alice-bob-1";
        assert_eq!(
            ledger.try_submit(text, &alice.sign(text)),
            Err(Rejection::PoolFull(MempoolError::MempoolFull(1)))
        );
    }

    #[test]
    fn test_settle_empty_pool() {
        let mut ledger = Ledger::new();
        ledger.register("alice").unwrap();
        assert!(matches!(ledger.settle(), Err(LedgerError::EmptyPool)));
    }

    #[test]
    fn test_settle_applies_and_rewards() {
        let mut ledger = Ledger::new();
        let alice = ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();

        assert!(alice.request_transfer(&mut ledger, "bob", 3.0).unwrap());
        let receipt = ledger.mine().unwrap();

        assert_eq!(receipt.miner, "alice");
        assert_eq!(receipt.applied.len(), 1);
        assert!(receipt.skipped.is_empty());
        assert!(ledger
            .config()
            .mining
            .difficulty
            .is_satisfied(&receipt.digest));
        assert_eq!(ledger.balance_of("alice").unwrap(), 8.25);
        assert_eq!(ledger.balance_of("bob").unwrap(), 8.0);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn test_trusting_policy_allows_overdraft() {
        let mut ledger = Ledger::new();
        let alice = ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();

        assert!(alice.request_transfer(&mut ledger, "bob", 4.0).unwrap());
        assert!(alice.request_transfer(&mut ledger, "bob", 4.0).unwrap());
        let receipt = ledger.mine().unwrap();

        assert_eq!(receipt.applied.len(), 2);
        assert_eq!(ledger.balance_of("alice").unwrap(), -3.0 + 6.25);
        assert_eq!(ledger.balance_of("bob").unwrap(), 13.0);
    }

    #[test]
    fn test_revalidate_policy_skips_overdraft() {
        let mut ledger = Ledger::with_config(LedgerConfig {
            settlement: SettlementPolicy::Revalidate,
            ..LedgerConfig::default()
        });
        let alice = ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();

        assert!(alice.request_transfer(&mut ledger, "bob", 4.0).unwrap());
        assert!(alice.request_transfer(&mut ledger, "bob", 4.0).unwrap());
        let receipt = ledger.mine().unwrap();

        assert_eq!(receipt.applied.len(), 1);
        assert_eq!(receipt.skipped.len(), 1);
        assert_eq!(ledger.balance_of("alice").unwrap(), 1.0 + 6.25);
        assert_eq!(ledger.balance_of("bob").unwrap(), 9.0);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn test_mining_timeout_leaves_pool() {
        let mut ledger = Ledger::with_config(unsolvable());
        let alice = ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();
        assert!(alice.request_transfer(&mut ledger, "bob", 1.0).unwrap());

        assert!(matches!(
            ledger.settle(),
            Err(LedgerError::MiningTimeout { attempts: 50 })
        ));
        assert_eq!(ledger.pending().len(), 1);
        assert_eq!(ledger.balance_of("alice").unwrap(), 5.0);
    }

    #[test]
    fn test_mining_cancelled() {
        let mut ledger = Ledger::new();
        let alice = ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();
        assert!(alice.request_transfer(&mut ledger, "bob", 1.0).unwrap());

        let cancel = AtomicBool::new(false);
        cancel.store(true, Ordering::Relaxed);
        assert!(matches!(
            ledger.mine_cancellable(&cancel),
            Err(LedgerError::MiningCancelled { attempts: 0 })
        ));
        assert_eq!(ledger.pending().len(), 1);
    }

    #[test]
    fn test_unresolvable_party_settles_nothing() {
        let mut ledger = Ledger::new();
        let alice = ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();
        assert!(alice.request_transfer(&mut ledger, "bob", 1.0).unwrap());

        // Bypass admission so the pool holds a receiver the ledger never registered.
        let stray = tallychain_core::Keypair::generate();
        ledger
            .mempool
            .add(Transaction::signed("alice", "ghost", 1.0, &stray))
            .unwrap();

        assert!(matches!(
            ledger.settle(),
            Err(LedgerError::UnknownAccount(id)) if id == "ghost"
        ));
        assert_eq!(ledger.pending().len(), 2);
        assert_eq!(ledger.balance_of("alice").unwrap(), 5.0);
        assert_eq!(ledger.balance_of("bob").unwrap(), 5.0);
    }

    #[test]
    fn test_dump_balances_in_registration_order() {
        let mut ledger = Ledger::new();
        ledger.register("carol").unwrap();
        ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();

        let ids: Vec<String> = ledger.dump_balances().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_display_wallets() {
        let mut ledger = Ledger::new();
        ledger.register("alice").unwrap();
        let shown = ledger.to_string();
        assert_eq!(shown, "********************\nalice : 5\n********************");
    }
}
