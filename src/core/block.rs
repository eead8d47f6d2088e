use crate::core::{MerkleProof, MerkleTree, Transaction};
use crate::error::Result;
use crate::utils::{deserialize, serialize, sha256_hex};
use serde::{Deserialize, Serialize};

pub const GENESIS_PREVIOUS_HASH: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    previous_hash: String,
    nonce: u64,
    hash: String,
    merkle_root: String, // hex root over sorted transaction ids, "" when empty
}

impl Block {
    /// Block 0. Not mined: its hash is computed once with nonce 0.
    pub fn genesis(timestamp: i64) -> Block {
        let mut block = Block {
            index: 0,
            timestamp,
            transactions: vec![],
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
            hash: String::new(),
            merkle_root: String::new(),
        };
        block.hash = block.hash_with_nonce(0);
        block
    }

    /// Unsealed block ready for the nonce search.
    pub fn candidate(
        index: u64,
        timestamp: i64,
        previous_hash: &str,
        transactions: Vec<Transaction>,
    ) -> Block {
        let merkle_root = Self::calculate_merkle_root(&transactions);
        Block {
            index,
            timestamp,
            transactions,
            previous_hash: previous_hash.to_string(),
            nonce: 0,
            hash: String::new(),
            merkle_root,
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_merkle_root(&self) -> &str {
        self.merkle_root.as_str()
    }

    pub fn contains_transaction(&self, tx_id: &str) -> bool {
        self.transactions.iter().any(|tx| tx.id == tx_id)
    }

    pub fn sorted_transaction_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.transactions.iter().map(|tx| tx.id.clone()).collect();
        ids.sort();
        ids
    }

    /// Everything the block hash covers except the nonce, already joined
    /// with `|`. The miner appends each candidate nonce to this prefix.
    pub fn hashing_prefix(&self) -> String {
        format!(
            "{}|{}|{}|{}|",
            self.index,
            self.timestamp,
            self.sorted_transaction_ids().join(","),
            self.previous_hash
        )
    }

    /// sha256 over "index|timestamp|sorted,tx,ids|previous_hash|nonce"
    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        sha256_hex(format!("{}{}", self.hashing_prefix(), nonce).as_bytes())
    }

    pub fn recompute_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    pub(crate) fn set_seal(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    fn calculate_merkle_root(transactions: &[Transaction]) -> String {
        let ids: Vec<&str> = transactions.iter().map(|tx| tx.id.as_str()).collect();
        MerkleTree::calculate_merkle_root(&ids)
    }

    /// Verify that the block's Merkle root matches its transactions
    pub fn verify_merkle_root(&self) -> bool {
        Self::calculate_merkle_root(&self.transactions) == self.merkle_root
    }

    pub fn generate_merkle_proof(&self, tx_id: &str) -> Option<MerkleProof> {
        let ids: Vec<&str> = self.transactions.iter().map(|tx| tx.id.as_str()).collect();
        MerkleTree::new(&ids).generate_proof(tx_id)
    }

    pub fn verify_merkle_proof(&self, proof: &MerkleProof) -> bool {
        proof.merkle_root == self.merkle_root && MerkleTree::verify_proof(proof)
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}
