//! # Levy Chain - a single-node ledger with a periodic levy
//!
//! Notes to self on how this fits together.
//!
//! ## What It Does
//! - **UTXO accounting**: balances are the sum of unspent outputs; transfers
//!   spend whole outputs and return change
//! - **Signed transfers**: Ed25519 keys, account ids derived from the public key
//! - **Proof-of-work sealing**: pending transactions are sealed into hash-linked
//!   blocks with a Merkle root over their ids
//! - **Periodic levy**: a scheduled job moves a percentage of every eligible
//!   balance into a pool account
//! - **Durable mirror**: best-effort copy of blocks, transactions, UTXOs and
//!   balances into sled
//!
//! ## How The Code Is Organized
//! - `core/`: blocks, transactions, Merkle tree, miner, ledger, transaction builder
//! - `wallet/`: key generation, signing, canonical payloads, account registry
//! - `storage/`: UTXO set, pending pool, persistence queue and stores, key vault
//! - `levy/`: levy engine and its scheduler thread
//! - `service/`: the operations a request layer calls
//! - `config/`, `error/`, `utils/`, `cli/`: the usual plumbing
//!
//! ## Where To Start Reading
//! 1. `core/ledger.rs` for sealing and the UTXO transitions
//! 2. `core/builder.rs` for coin selection and validation
//! 3. `levy/engine.rs` for the levy cycle
//! 4. `service/ledger_service.rs` for how it is all wired

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod levy;
pub mod service;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Console, MiningPolicyArg, Opt};
pub use config::{LedgerConfig, LevyConfig, MiningConfig, MiningPolicy, PersistenceConfig};
pub use core::{
    Block, CoinSelection, Ledger, MerkleProof, MerkleTree, Miner, Transaction,
    TransactionBuilder, TransactionKind, TxStatus, Utxo, UtxoRef,
};
pub use error::{LedgerError, Result};
pub use levy::{levy_amount, LevyCharge, LevyEngine, LevyHandle, LevyReport, LevyScheduler};
pub use service::{Credentials, LedgerService, TransferRequest};
pub use storage::{
    decrypt_private_key, encrypt_private_key, LedgerStore, LevyRecord, MemoryStore, PendingPool,
    PersistenceQueue, PersistenceStats, SledStore, StoredTransaction, UtxoSet,
};
pub use utils::{current_timestamp, sha256_digest, sha256_hex};
pub use wallet::{
    canonical_payload, derive_account_id, sign, verify, AccountRecord, AccountRegistry,
    InMemoryRegistry, KeyPair,
};
