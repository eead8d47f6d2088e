use crate::core::{Block, Transaction, TxStatus, Utxo};
use crate::error::{LedgerError, Result};
use crate::storage::{LedgerStore, LevyRecord, StoredTransaction};
use crate::wallet::AccountRecord;
use crate::utils::{deserialize, serialize};
use log::info;
use sled::{Db, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";
const TRANSACTIONS_TREE: &str = "transactions";
const UTXOS_TREE: &str = "utxos";
const BALANCES_TREE: &str = "balances";
const ACCOUNTS_TREE: &str = "accounts";
const LEVIES_TREE: &str = "levies";

/// Sled-backed mirror. Blocks are keyed by big-endian index so iteration
/// returns them in chain order; everything else is keyed by id.
pub struct SledStore {
    db: Db,
    blocks: Tree,
    transactions: Tree,
    utxos: Tree,
    balances: Tree,
    accounts: Tree,
    levies: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SledStore> {
        let db = sled::open(path.as_ref())
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {e}")))?;
        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| LedgerError::Database(format!("Failed to open {name} tree: {e}")))
        };
        let blocks = open_tree(BLOCKS_TREE)?;
        let transactions = open_tree(TRANSACTIONS_TREE)?;
        let utxos = open_tree(UTXOS_TREE)?;
        let balances = open_tree(BALANCES_TREE)?;
        let accounts = open_tree(ACCOUNTS_TREE)?;
        let levies = open_tree(LEVIES_TREE)?;
        let store = SledStore {
            db,
            blocks,
            transactions,
            utxos,
            balances,
            accounts,
            levies,
        };
        info!("Opened ledger mirror at {}", path.as_ref().display());
        Ok(store)
    }

    pub fn transaction(&self, tx_id: &str) -> Result<Option<StoredTransaction>> {
        self.transactions
            .get(tx_id)?
            .map(|bytes| deserialize::<StoredTransaction>(&bytes))
            .transpose()
    }

    pub fn balance(&self, account_id: &str) -> Result<Option<u64>> {
        self.balances
            .get(account_id)?
            .map(|bytes| deserialize::<u64>(&bytes))
            .transpose()
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl LedgerStore for SledStore {
    fn save_block(&self, block: &Block) -> Result<()> {
        self.blocks
            .insert(block.get_index().to_be_bytes(), block.serialize()?)?;
        Ok(())
    }

    fn save_transaction(&self, tx: &Transaction, status: TxStatus) -> Result<()> {
        let record = StoredTransaction {
            transaction: tx.clone(),
            status,
        };
        self.transactions.insert(tx.id.as_bytes(), serialize(&record)?)?;
        Ok(())
    }

    fn save_utxo(&self, utxo: &Utxo) -> Result<()> {
        self.utxos.insert(utxo.id.as_bytes(), serialize(utxo)?)?;
        Ok(())
    }

    fn update_balance(&self, account_id: &str, balance: u64) -> Result<()> {
        self.balances
            .insert(account_id.as_bytes(), serialize(&balance)?)?;
        Ok(())
    }

    fn save_account(&self, account: &AccountRecord) -> Result<()> {
        self.accounts
            .insert(account.account_id.as_bytes(), serialize(account)?)?;
        Ok(())
    }

    fn save_levy(&self, record: &LevyRecord) -> Result<()> {
        self.levies.insert(record.tx_id.as_bytes(), serialize(record)?)?;
        Ok(())
    }

    fn load_utxos(&self) -> Result<Vec<Utxo>> {
        self.utxos
            .iter()
            .values()
            .map(|bytes| deserialize::<Utxo>(&bytes?))
            .collect()
    }

    fn load_blocks(&self) -> Result<Vec<Block>> {
        self.blocks
            .iter()
            .values()
            .map(|bytes| Block::deserialize(&bytes?))
            .collect()
    }

    fn load_accounts(&self) -> Result<Vec<AccountRecord>> {
        self.accounts
            .iter()
            .values()
            .map(|bytes| deserialize::<AccountRecord>(&bytes?))
            .collect()
    }

    fn load_levies(&self) -> Result<Vec<LevyRecord>> {
        self.levies
            .iter()
            .values()
            .map(|bytes| deserialize::<LevyRecord>(&bytes?))
            .collect()
    }
}
