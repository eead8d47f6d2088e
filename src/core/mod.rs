//! Core ledger functionality
//!
//! Blocks, transactions and their Merkle commitments, the proof-of-work
//! miner, the ledger that seals pending transactions into the chain, and the
//! builder that assembles and validates transfers and levies.

pub mod block;
pub mod builder;
pub mod ledger;
pub mod merkle;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, GENESIS_PREVIOUS_HASH};
pub use builder::{CoinSelection, TransactionBuilder};
pub use ledger::{Ledger, MAX_SEAL_ATTEMPTS};
pub use merkle::{MerkleProof, MerkleTree, ProofElement};
pub use proof_of_work::{leading_zeros, Miner, MiningOutcome};
pub use transaction::{
    Transaction, TransactionKind, TxStatus, Utxo, UtxoRef, COINBASE_SENDER, REWARD_PUBLIC_KEY,
    REWARD_SIGNATURE, SYSTEM_SENTINEL,
};
