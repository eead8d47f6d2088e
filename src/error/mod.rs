//! Error handling for the ledger
//!
//! Every fallible operation in the crate returns [`LedgerError`]. The first
//! group of variants is the ledger's own taxonomy (coin selection, validation,
//! sealing); the rest wrap the ambient failures of storage, crypto and config.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Coin selection could not reach the requested amount
    InsufficientBalance { required: u64, available: u64 },
    /// Sender, receiver or miner is unknown to the account registry
    AccountNotFound(String),
    /// Signature did not verify against the declared public key
    SignatureInvalid(String),
    /// Account id derived from the public key differs from the declared sender
    IdentityMismatch { declared: String, derived: String },
    /// An input references a UTXO that does not exist
    UtxoNotFound(String),
    /// An input references a UTXO that is spent, or spent twice in one batch
    DoubleSpend(String),
    /// sum(inputs) != sum(outputs)
    AmountMismatch { inputs: u64, outputs: u64 },
    /// Nonce search exhausted its budget without meeting the difficulty target
    MiningIncomplete { iterations: u64, best_hash: String },
    /// Structurally invalid transaction (zero amount, outputs off the signed fields, overflow)
    InvalidTransaction(String),
    /// Block failed chain verification
    InvalidBlock(String),
    /// The non-blocking seal kept losing the race against concurrent commits
    StaleSeal(String),
    /// Key parsing, signing or hashing errors
    Crypto(String),
    /// Private key encryption/decryption errors
    Encryption(String),
    /// Durable store errors
    Database(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// Unparseable console command
    InvalidCommand(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InsufficientBalance {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient balance: required {required}, available {available}"
                )
            }
            LedgerError::AccountNotFound(id) => write!(f, "Account not found: {id}"),
            LedgerError::SignatureInvalid(msg) => write!(f, "Invalid signature: {msg}"),
            LedgerError::IdentityMismatch { declared, derived } => write!(
                f,
                "Public key does not match sender: declared {declared}, derived {derived}"
            ),
            LedgerError::UtxoNotFound(id) => write!(f, "UTXO {id} not found"),
            LedgerError::DoubleSpend(msg) => write!(f, "Double spend: {msg}"),
            LedgerError::AmountMismatch { inputs, outputs } => write!(
                f,
                "Input total ({inputs}) does not match output total ({outputs})"
            ),
            LedgerError::MiningIncomplete {
                iterations,
                best_hash,
            } => write!(
                f,
                "Mining incomplete after {iterations} iterations (best hash {best_hash})"
            ),
            LedgerError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            LedgerError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            LedgerError::StaleSeal(msg) => write!(f, "Stale seal: {msg}"),
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::Encryption(msg) => write!(f, "Encryption error: {msg}"),
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::InvalidCommand(msg) => write!(f, "Invalid command: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
