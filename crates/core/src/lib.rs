//! Core primitives for tallychain.
//!
//! This crate is stateless and provides:
//! - Ed25519 keypairs, signing and verification
//! - Blake3 digests
//! - The canonical `sender-receiver-amount` transaction codec

pub mod crypto;
pub mod hash;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use crypto::{generate_keypair, sign, verify, CryptoError, Keypair, PublicKey, Signature};
pub use hash::{digest, hash, hash_concat, Hash, H256};
pub use transaction::{ParseError, Transaction};
