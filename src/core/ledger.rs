// The ledger holds the chain, the UTXO set and the pending pool behind one lock,
// so every reader sees a consistent triple. Sealing a block is the only place
// where all three change together.

use crate::config::{MiningConfig, MiningPolicy};
use crate::core::{
    Block, Miner, Transaction, TxStatus, Utxo, UtxoRef, GENESIS_PREVIOUS_HASH,
};
use crate::error::{LedgerError, Result};
use crate::storage::{PendingPool, UtxoSet};
use crate::utils::current_timestamp;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Attempts `seal_concurrent` makes before giving up with `StaleSeal`
pub const MAX_SEAL_ATTEMPTS: usize = 3;

struct LedgerState {
    chain: Vec<Block>,
    utxos: UtxoSet,
    pending: PendingPool,
}

impl LedgerState {
    fn tip(&self) -> &Block {
        // The chain always holds at least the genesis block
        &self.chain[self.chain.len() - 1]
    }

    /// Splits pending transactions into the ones that can still be sealed
    /// and the ones whose inputs are gone. Earlier transactions win when two
    /// of them spend the same output.
    fn select_batch(&self, pending: &[Transaction]) -> (Vec<Transaction>, Vec<String>) {
        let mut consumed: HashSet<&UtxoRef> = HashSet::new();
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for tx in pending {
            match check_inputs(&self.utxos, &consumed, tx) {
                Ok(()) => {
                    consumed.extend(tx.inputs.iter());
                    accepted.push(tx.clone());
                }
                Err(e) => {
                    warn!("Dropping pending transaction {}: {e}", tx.id);
                    rejected.push(tx.id.clone());
                }
            }
        }
        (accepted, rejected)
    }

    fn candidate(&self, miner_account: &str, reward: u64, timestamp: i64) -> (Block, Vec<String>) {
        let index = self.chain.len() as u64;
        let pending = self.pending.snapshot();
        let considered: Vec<String> = pending.iter().map(|tx| tx.id.clone()).collect();
        let (accepted, _) = self.select_batch(&pending);

        let mut transactions = Vec::with_capacity(accepted.len() + 1);
        transactions.push(Transaction::new_reward(miner_account, reward, index, timestamp));
        transactions.extend(accepted);

        let block = Block::candidate(index, timestamp, self.tip().get_hash(), transactions);
        (block, considered)
    }

    /// Applies a sealed block: spend inputs, create outputs, append.
    fn commit(&mut self, block: Block) {
        for tx in block.get_transactions() {
            for input in &tx.inputs {
                self.utxos.mark_spent(input);
            }
            for (idx, out) in tx.outputs.iter().enumerate() {
                self.utxos
                    .insert(Utxo::new(&tx.id, idx as u32, &out.owner, out.amount));
            }
        }
        self.chain.push(block);
    }
}

/// Checks a transaction's inputs against the committed set and the outputs
/// already consumed earlier in the same batch.
fn check_inputs(utxos: &UtxoSet, consumed: &HashSet<&UtxoRef>, tx: &Transaction) -> Result<()> {
    let mut own: HashSet<&UtxoRef> = HashSet::new();
    for input in &tx.inputs {
        if consumed.contains(input) || !own.insert(input) {
            return Err(LedgerError::DoubleSpend(format!(
                "UTXO {input} spent twice in one block"
            )));
        }
        match utxos.get(input) {
            None => return Err(LedgerError::UtxoNotFound(input.to_string())),
            Some(utxo) if utxo.spent => {
                return Err(LedgerError::DoubleSpend(format!("UTXO {input} already spent")))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

pub struct Ledger {
    state: RwLock<LedgerState>,
    miner: Miner,
    reward: u64,
}

impl Ledger {
    pub fn new(config: &MiningConfig) -> Result<Ledger> {
        Ok(Self::with_genesis_timestamp(config, current_timestamp()?))
    }

    pub fn with_genesis_timestamp(config: &MiningConfig, timestamp: i64) -> Ledger {
        let genesis = Block::genesis(timestamp);
        info!("Created genesis block {}", genesis.get_hash());
        Ledger {
            state: RwLock::new(LedgerState {
                chain: vec![genesis],
                utxos: UtxoSet::new(),
                pending: PendingPool::new(),
            }),
            miner: Miner::new(config),
            reward: config.reward,
        }
    }

    // Poisoned locks are recovered: state only changes after every fallible step.
    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn reward(&self) -> u64 {
        self.reward
    }

    /// Queues a transaction for the next block. No validation happens here.
    pub fn append_pending(&self, tx: Transaction) {
        debug!("Queued {} transaction {}", tx.kind, tx.id);
        self.write().pending.push(tx);
    }

    pub fn balance(&self, account_id: &str) -> u64 {
        self.read().utxos.balance_of(account_id)
    }

    pub fn pending_snapshot(&self) -> Vec<Transaction> {
        self.read().pending.snapshot()
    }

    pub fn pending_len(&self) -> usize {
        self.read().pending.len()
    }

    /// Runs `f` against the committed UTXO set under a shared lock.
    pub fn inspect_utxos<R, F: FnOnce(&UtxoSet) -> R>(&self, f: F) -> R {
        f(&self.read().utxos)
    }

    pub fn unspent_outputs(&self, account_id: &str) -> Vec<Utxo> {
        self.read().utxos.unspent_for(account_id)
    }

    pub fn utxo(&self, outpoint: &UtxoRef) -> Option<Utxo> {
        self.read().utxos.get(outpoint).cloned()
    }

    pub fn chain(&self) -> Vec<Block> {
        self.read().chain.clone()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        self.read().chain.get(index as usize).cloned()
    }

    /// Index of the tip block
    pub fn height(&self) -> u64 {
        self.read().chain.len() as u64 - 1
    }

    pub fn tip_hash(&self) -> String {
        self.read().tip().get_hash().to_string()
    }

    pub fn transaction_status(&self, tx_id: &str) -> Option<TxStatus> {
        let state = self.read();
        if state.pending.contains(tx_id) {
            return Some(TxStatus::Pending);
        }
        state
            .chain
            .iter()
            .find(|block| block.contains_transaction(tx_id))
            .map(|block| TxStatus::Confirmed {
                block_index: block.get_index(),
            })
    }

    pub fn find_transaction(&self, tx_id: &str) -> Option<Transaction> {
        let state = self.read();
        if let Some(tx) = state.pending.get(tx_id) {
            return Some(tx.clone());
        }
        state
            .chain
            .iter()
            .flat_map(|block| block.get_transactions())
            .find(|tx| tx.id == tx_id)
            .cloned()
    }

    /// Mints an off-chain starting balance straight into the UTXO set.
    /// No transaction or block records it.
    pub fn grant_faucet(&self, account_id: &str, amount: u64) -> Result<Utxo> {
        if amount == 0 {
            return Err(LedgerError::InvalidTransaction(
                "Faucet amount must be positive".to_string(),
            ));
        }
        let origin = format!("faucet-{account_id}-{}", Uuid::new_v4());
        let utxo = Utxo::new(&origin, 0, account_id, amount);
        self.write().utxos.insert(utxo.clone());
        info!("Granted faucet output {} of {amount} to {account_id}", utxo.id);
        Ok(utxo)
    }

    /// Loads outputs from the durable mirror at startup.
    pub fn restore_utxos(&self, records: Vec<Utxo>) -> usize {
        let mut state = self.write();
        let count = records.len();
        for utxo in records {
            state.utxos.insert(utxo);
        }
        info!("Restored {count} UTXO records");
        count
    }

    /// Seals all pending transactions into a new block under exclusive
    /// access for the whole operation.
    ///
    /// The block holds the reward transaction first, then pending transactions
    /// in arrival order. A pending transaction whose inputs are missing, spent,
    /// or consumed by an earlier transaction in the batch is dropped. With an
    /// empty pool the block carries only the reward. Under the strict mining
    /// policy an exhausted nonce search changes nothing.
    pub fn seal(&self, miner_account: &str) -> Result<Block> {
        let timestamp = current_timestamp()?;
        let mut state = self.write();
        let (candidate, _) = state.candidate(miner_account, self.reward, timestamp);
        let block = self.miner.seal(candidate)?;

        state.commit(block.clone());
        state.pending.clear();
        info!(
            "Sealed block #{} with {} transactions",
            block.get_index(),
            block.get_transactions().len()
        );
        Ok(block)
    }

    /// Like `seal`, but mines without holding the lock.
    ///
    /// Pending transactions are snapshotted under a shared lock, mined, then
    /// committed only if the tip has not moved and every input is still
    /// unspent. Transactions that arrived during mining stay pending.
    pub fn seal_concurrent(&self, miner_account: &str) -> Result<Block> {
        self.seal_concurrent_with(miner_account, |_| {})
    }

    /// `after_mining` runs with no lock held, between the nonce search and
    /// the commit of each attempt.
    fn seal_concurrent_with<F: FnMut(usize)>(
        &self,
        miner_account: &str,
        mut after_mining: F,
    ) -> Result<Block> {
        for attempt in 1..=MAX_SEAL_ATTEMPTS {
            let timestamp = current_timestamp()?;
            let (candidate, considered) = self.read().candidate(miner_account, self.reward, timestamp);
            let block = self.miner.seal(candidate)?;
            after_mining(attempt);

            let mut state = self.write();
            if state.tip().get_hash() != block.get_previous_hash() {
                warn!("Seal attempt {attempt} lost the race: tip moved during mining");
                continue;
            }
            let inputs_live = block
                .get_transactions()
                .iter()
                .flat_map(|tx| tx.inputs.iter())
                .all(|input| state.utxos.is_unspent(input));
            if !inputs_live {
                warn!("Seal attempt {attempt} lost the race: inputs spent during mining");
                continue;
            }

            state.commit(block.clone());
            let considered: HashSet<String> = considered.into_iter().collect();
            state.pending.retain(|tx| !considered.contains(&tx.id));
            info!(
                "Sealed block #{} with {} transactions (attempt {attempt})",
                block.get_index(),
                block.get_transactions().len()
            );
            return Ok(block);
        }
        Err(LedgerError::StaleSeal(format!(
            "gave up after {MAX_SEAL_ATTEMPTS} attempts"
        )))
    }

    /// Re-checks links, hashes, Merkle roots and rewards for the whole chain.
    /// Proof-of-work is only enforced under the strict mining policy.
    pub fn verify_chain(&self) -> Result<()> {
        let state = self.read();
        let enforce_work = self.miner.get_policy() == MiningPolicy::Strict;

        for (position, block) in state.chain.iter().enumerate() {
            let index = block.get_index();
            if index != position as u64 {
                return Err(LedgerError::InvalidBlock(format!(
                    "block at position {position} has index {index}"
                )));
            }
            if block.recompute_hash() != block.get_hash() {
                return Err(LedgerError::InvalidBlock(format!("block #{index} hash mismatch")));
            }
            if !block.verify_merkle_root() {
                return Err(LedgerError::InvalidBlock(format!(
                    "block #{index} merkle root mismatch"
                )));
            }

            if position == 0 {
                if block.get_previous_hash() != GENESIS_PREVIOUS_HASH
                    || !block.get_transactions().is_empty()
                {
                    return Err(LedgerError::InvalidBlock("malformed genesis block".to_string()));
                }
                continue;
            }

            let previous = &state.chain[position - 1];
            if block.get_previous_hash() != previous.get_hash() {
                return Err(LedgerError::InvalidBlock(format!(
                    "block #{index} does not link to block #{}",
                    previous.get_index()
                )));
            }
            if enforce_work && !self.miner.meets_difficulty(block.get_hash()) {
                return Err(LedgerError::InvalidBlock(format!(
                    "block #{index} does not meet difficulty"
                )));
            }
            match block.get_transactions().first() {
                Some(reward)
                    if reward.is_reward()
                        && reward.inputs.is_empty()
                        && reward.outputs.len() == 1
                        && reward.outputs[0].amount == self.reward => {}
                _ => {
                    return Err(LedgerError::InvalidBlock(format!(
                        "block #{index} does not start with a valid reward"
                    )))
                }
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn tamper_block<F: FnOnce(&mut Block)>(&self, index: usize, f: F) {
        let mut state = self.write();
        f(&mut state.chain[index]);
    }
}
