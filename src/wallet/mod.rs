//! Keys, signing and the account registry
//!
//! Accounts are Ed25519 keypairs. An account id is the first 40 hex
//! characters of SHA-256 over the raw public key; there is no other
//! allocation step.

pub mod keys;
pub mod payload;
pub mod registry;

pub use keys::{derive_account_id, sign, verify, KeyPair, ACCOUNT_ID_LEN};
pub use payload::canonical_payload;
pub use registry::{AccountRecord, AccountRegistry, InMemoryRegistry};
