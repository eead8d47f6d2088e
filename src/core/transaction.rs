// Transactions and the unspent outputs they consume and create.
// Value only moves by spending whole UTXOs; any surplus comes back as change.

use crate::error::{LedgerError, Result};
use crate::wallet::canonical_payload;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const COINBASE_SENDER: &str = "COINBASE";
pub const REWARD_PUBLIC_KEY: &str = "SYSTEM";
pub const REWARD_SIGNATURE: &str = "COINBASE";
/// Public key and signature of levy transactions, which carry no holder signature
pub const SYSTEM_SENTINEL: &str = "system";

/// Points at output `index` of transaction `tx_id`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct UtxoRef {
    #[serde(rename = "txid")]
    pub tx_id: String,
    pub index: u32,
}

impl UtxoRef {
    pub fn new(tx_id: &str, index: u32) -> UtxoRef {
        UtxoRef {
            tx_id: tx_id.to_string(),
            index,
        }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Utxo {
    /// "<origin_tx>:<index>"
    pub id: String,
    pub owner: String,
    pub amount: u64,
    pub origin_tx: String,
    pub index: u32,
    pub spent: bool,
}

impl Utxo {
    pub fn new(origin_tx: &str, index: u32, owner: &str, amount: u64) -> Utxo {
        Utxo {
            id: UtxoRef::new(origin_tx, index).to_string(),
            owner: owner.to_string(),
            amount,
            origin_tx: origin_tx.to_string(),
            index,
            spent: false,
        }
    }

    pub fn outpoint(&self) -> UtxoRef {
        UtxoRef::new(&self.origin_tx, self.index)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub enum TransactionKind {
    #[serde(rename = "transfer")]
    Transfer,
    #[serde(rename = "mining_reward")]
    Reward,
    #[serde(rename = "levy_deduction")]
    Levy,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Reward => "mining_reward",
            TransactionKind::Levy => "levy_deduction",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a transaction is still in the pending pool or sealed into a block
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum TxStatus {
    Pending,
    Confirmed { block_index: u64 },
}

impl TxStatus {
    pub fn block_index(&self) -> Option<u64> {
        match self {
            TxStatus::Pending => None,
            TxStatus::Confirmed { block_index } => Some(*block_index),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed { .. } => "confirmed",
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    pub timestamp: i64,
    #[serde(rename = "pubkey")]
    pub public_key: String,
    pub signature: String,
    pub inputs: Vec<UtxoRef>,
    pub outputs: Vec<Utxo>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

impl Transaction {
    /// Block reward: no inputs, one output minting `reward` to the miner.
    pub fn new_reward(miner_account: &str, reward: u64, block_index: u64, timestamp: i64) -> Self {
        let id = format!("coinbase-{block_index}-{timestamp}");
        Transaction {
            outputs: vec![Utxo::new(&id, 0, miner_account, reward)],
            id,
            sender_id: COINBASE_SENDER.to_string(),
            receiver_id: miner_account.to_string(),
            amount: reward,
            note: format!("Mining reward for block #{block_index}"),
            timestamp,
            public_key: REWARD_PUBLIC_KEY.to_string(),
            signature: REWARD_SIGNATURE.to_string(),
            inputs: vec![],
            kind: TransactionKind::Reward,
        }
    }

    /// The bytes the sender signed.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        canonical_payload(
            &self.sender_id,
            &self.receiver_id,
            self.amount,
            self.timestamp,
            &self.note,
        )
    }

    pub fn is_reward(&self) -> bool {
        self.kind == TransactionKind::Reward
    }

    /// Reward and levy transactions are authored by the ledger itself.
    pub fn is_system(&self) -> bool {
        matches!(self.kind, TransactionKind::Reward | TransactionKind::Levy)
    }

    pub fn output_total(&self) -> Result<u64> {
        self.outputs.iter().try_fold(0u64, |total, out| {
            total
                .checked_add(out.amount)
                .ok_or_else(|| LedgerError::InvalidTransaction("Output value overflow".to_string()))
        })
    }

    /// Accounts whose balance this transaction changes.
    pub fn affected_accounts(&self) -> Vec<String> {
        let mut accounts = Vec::new();
        if self.sender_id != COINBASE_SENDER {
            accounts.push(self.sender_id.clone());
        }
        accounts.push(self.receiver_id.clone());
        for out in &self.outputs {
            accounts.push(out.owner.clone());
        }
        accounts.sort();
        accounts.dedup();
        accounts
    }
}
