//! Data storage and persistence
//!
//! In-memory state (UTXO set, pending pool) owned by the ledger, the durable
//! mirror it is copied into, and encrypted storage for private keys.

pub mod encrypted;
pub mod memory_pool;
pub mod memory_store;
pub mod persistence;
pub mod sled_store;
pub mod utxo_set;

pub use encrypted::{decrypt_private_key, encrypt_private_key};
pub use memory_pool::PendingPool;
pub use memory_store::MemoryStore;
pub use persistence::{
    LedgerStore, LevyRecord, PersistenceQueue, PersistenceStats, StoredTransaction,
};
pub use sled_store::SledStore;
pub use utxo_set::UtxoSet;
