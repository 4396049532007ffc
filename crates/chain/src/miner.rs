//! Nonce search over the pending pool.
//!
//! A candidate nonce is appended (in decimal) to the pool payload and the result is
//! hashed. The pool is solved when the digest's decimal digits contain a run of zeros
//! near the front, see [`DifficultyRule`].
//!
//! The search is bounded: it gives up after `max_attempts` candidates, once an
//! optional deadline elapses, or when a cancel flag is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tallychain_core::{hash_concat, Hash};
use thiserror::Error;
use tracing::debug;

/// Why a search stopped without a solution.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SearchStop {
    #[error("no solution after {attempts} attempts")]
    Exhausted { attempts: u64 },

    #[error("deadline elapsed after {attempts} attempts")]
    DeadlineElapsed { attempts: u64 },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
}

/// The digest-pattern test gating settlement.
///
/// Only the decimal-digit characters of the hex digest count. The first
/// `digit_window` of them are collected and the rule holds if any contiguous run of
/// `zero_run` of them is all `'0'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyRule {
    pub digit_window: usize,
    pub zero_run: usize,
}

impl Default for DifficultyRule {
    fn default() -> Self {
        Self {
            digit_window: 10,
            zero_run: 3,
        }
    }
}

impl DifficultyRule {
    /// Test a digest against the rule.
    pub fn is_satisfied(&self, digest: &Hash) -> bool {
        if self.zero_run == 0 {
            return true;
        }
        let digits: Vec<char> = digest.decimal_digits().take(self.digit_window).collect();
        digits
            .windows(self.zero_run)
            .any(|run| run.iter().all(|c| *c == '0'))
    }
}

/// Bounds and difficulty for a nonce search.
#[derive(Debug, Clone)]
pub struct MiningConfig {
    /// Maximum candidates tried before giving up.
    pub max_attempts: u64,
    /// Wall-clock budget for one search.
    pub deadline: Option<Duration>,
    pub difficulty: DifficultyRule,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1_000_000,
            deadline: None,
            difficulty: DifficultyRule::default(),
        }
    }
}

/// A winning candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u64,
    pub digest: Hash,
    /// Index of the pending transaction whose sender produced the nonce.
    pub miner_index: usize,
    pub attempts: u64,
}

/// Hash `payload` followed by the decimal rendering of `nonce`.
pub fn candidate_digest(payload: &str, nonce: u64) -> Hash {
    hash_concat(&[payload.as_bytes(), nonce.to_string().as_bytes()])
}

/// Round-robin nonce search.
///
/// Attempt `k` asks `next_candidate(k % miners)` for a nonce, so every pending
/// transaction's sender takes a turn in admission order. With no miners the search
/// is exhausted immediately.
pub fn search<F>(
    payload: &str,
    miners: usize,
    config: &MiningConfig,
    cancel: Option<&AtomicBool>,
    mut next_candidate: F,
) -> Result<Solution, SearchStop>
where
    F: FnMut(usize) -> u64,
{
    if miners == 0 {
        return Err(SearchStop::Exhausted { attempts: 0 });
    }

    let started = Instant::now();
    let mut attempts = 0u64;

    while attempts < config.max_attempts {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(SearchStop::Cancelled { attempts });
        }
        if config.deadline.is_some_and(|limit| started.elapsed() >= limit) {
            return Err(SearchStop::DeadlineElapsed { attempts });
        }

        let miner_index = (attempts % miners as u64) as usize;
        let nonce = next_candidate(miner_index);
        let digest = candidate_digest(payload, nonce);
        attempts += 1;

        if config.difficulty.is_satisfied(&digest) {
            debug!(attempts, nonce, %digest, "nonce search solved");
            return Ok(Solution {
                nonce,
                digest,
                miner_index,
                attempts,
            });
        }
    }

    Err(SearchStop::Exhausted { attempts })
}
