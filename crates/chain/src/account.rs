//! Account actors.
//!
//! An [`Account`] holds an id and a keypair. Balances live in the [`Ledger`]; an
//! account only knows how to sign and how to ask the ledger about itself.

use crate::ledger::{Ledger, Result};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tallychain_core::{Keypair, PublicKey, Signature, Transaction};
use tracing::debug;

/// A registered actor. The private key never leaves this value.
pub struct Account {
    id: String,
    keypair: Keypair,
}

impl Account {
    /// Generate a keypair for a freshly registered id.
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            keypair: Keypair::generate(),
        }
    }

    /// Register with `ledger` and return the new account.
    ///
    /// `id_hint` becomes the id unless it is taken, in which case a random numeric
    /// suffix is appended.
    pub fn create(id_hint: &str, ledger: &mut Ledger) -> Result<Arc<Account>> {
        ledger.register(id_hint)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public_key
    }

    /// Sign arbitrary text with this account's key.
    pub fn sign(&self, text: &str) -> Signature {
        self.keypair.sign(text.as_bytes())
    }

    /// Current settled balance as recorded by `ledger`.
    pub fn balance(&self, ledger: &Ledger) -> Result<f64> {
        ledger.balance_of(&self.id)
    }

    /// Sign a transfer and submit it to the pending pool.
    ///
    /// Returns `Ok(false)` without submitting if the receiver is unknown or the
    /// settled balance is below `amount`; otherwise the ledger's admission result.
    /// Fails with [`LedgerError::UnknownAccount`] if this account is not registered
    /// with `ledger`.
    ///
    /// [`LedgerError::UnknownAccount`]: crate::ledger::LedgerError::UnknownAccount
    pub fn request_transfer(
        &self,
        ledger: &mut Ledger,
        receiver: &str,
        amount: f64,
    ) -> Result<bool> {
        if ledger.find(receiver).is_none() {
            debug!(sender = %self.id, receiver, "transfer to unknown receiver");
            return Ok(false);
        }
        let balance = self.balance(ledger)?;
        if balance < amount {
            debug!(sender = %self.id, balance, amount, "insufficient balance for transfer");
            return Ok(false);
        }

        let tx = Transaction::signed(&self.id, receiver, amount, &self.keypair);
        Ok(ledger.submit(&tx.text, &tx.signature))
    }

    /// A uniformly random nonce candidate over the full `u64` range.
    pub fn next_nonce_candidate(&self) -> u64 {
        rand::thread_rng().gen()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("public_key", self.public_key())
            .finish()
    }
}
