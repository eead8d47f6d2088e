use crate::core::{Block, Transaction, TxStatus, Utxo};
use crate::error::Result;
use crate::storage::{LedgerStore, LevyRecord, StoredTransaction};
use crate::wallet::AccountRecord;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    blocks: BTreeMap<u64, Block>,
    transactions: HashMap<String, StoredTransaction>,
    utxos: HashMap<String, Utxo>,
    balances: HashMap<String, u64>,
    accounts: BTreeMap<String, AccountRecord>,
    levies: HashMap<String, LevyRecord>,
}

/// In-memory [`LedgerStore`]. Clones share the same tables, so a test can
/// keep a handle while the persistence writer owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn transaction(&self, tx_id: &str) -> Option<StoredTransaction> {
        self.tables().transactions.get(tx_id).cloned()
    }

    pub fn balance(&self, account_id: &str) -> Option<u64> {
        self.tables().balances.get(account_id).copied()
    }

    pub fn utxo(&self, utxo_id: &str) -> Option<Utxo> {
        self.tables().utxos.get(utxo_id).cloned()
    }

    pub fn account(&self, account_id: &str) -> Option<AccountRecord> {
        self.tables().accounts.get(account_id).cloned()
    }
}

impl LedgerStore for MemoryStore {
    fn save_block(&self, block: &Block) -> Result<()> {
        self.tables().blocks.insert(block.get_index(), block.clone());
        Ok(())
    }

    fn save_transaction(&self, tx: &Transaction, status: TxStatus) -> Result<()> {
        self.tables().transactions.insert(
            tx.id.clone(),
            StoredTransaction {
                transaction: tx.clone(),
                status,
            },
        );
        Ok(())
    }

    fn save_utxo(&self, utxo: &Utxo) -> Result<()> {
        self.tables().utxos.insert(utxo.id.clone(), utxo.clone());
        Ok(())
    }

    fn update_balance(&self, account_id: &str, balance: u64) -> Result<()> {
        self.tables().balances.insert(account_id.to_string(), balance);
        Ok(())
    }

    fn save_account(&self, account: &AccountRecord) -> Result<()> {
        self.tables()
            .accounts
            .insert(account.account_id.clone(), account.clone());
        Ok(())
    }

    fn save_levy(&self, record: &LevyRecord) -> Result<()> {
        self.tables().levies.insert(record.tx_id.clone(), record.clone());
        Ok(())
    }

    fn load_utxos(&self) -> Result<Vec<Utxo>> {
        Ok(self.tables().utxos.values().cloned().collect())
    }

    fn load_blocks(&self) -> Result<Vec<Block>> {
        Ok(self.tables().blocks.values().cloned().collect())
    }

    fn load_accounts(&self) -> Result<Vec<AccountRecord>> {
        Ok(self.tables().accounts.values().cloned().collect())
    }

    fn load_levies(&self) -> Result<Vec<LevyRecord>> {
        Ok(self.tables().levies.values().cloned().collect())
    }
}
