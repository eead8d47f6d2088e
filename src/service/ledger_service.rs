use crate::config::LedgerConfig;
use crate::core::{
    Block, Ledger, Transaction, TransactionBuilder, TxStatus, Utxo, UtxoRef, COINBASE_SENDER,
};
use crate::error::{LedgerError, Result};
use crate::storage::{
    decrypt_private_key, LedgerStore, LevyRecord, PersistenceQueue, PersistenceStats, SledStore,
};
use crate::wallet::{derive_account_id, AccountRecord, AccountRegistry, InMemoryRegistry};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use zeroize::Zeroizing;

/// How the sender proves they hold the key
#[derive(Clone)]
pub enum Credentials {
    /// Hex private key (seed ‖ public key, or a bare seed)
    PrivateKey(String),
    /// Passphrase unlocking the encrypted key stored at registration
    Passphrase(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::PrivateKey(_) => f.write_str("PrivateKey(..)"),
            Credentials::Passphrase(_) => f.write_str("Passphrase(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: u64,
    pub note: String,
    pub credentials: Credentials,
}

pub struct LedgerService {
    config: LedgerConfig,
    ledger: Arc<Ledger>,
    registry: Arc<InMemoryRegistry>,
    builder: TransactionBuilder,
    /// Confirmed levies per account, oldest first
    levies: RwLock<BTreeMap<String, Vec<LevyRecord>>>,
    persistence: Option<PersistenceQueue>,
}

impl LedgerService {
    /// Builds the service from config, opening a sled mirror when
    /// `persistence.path` is set.
    pub fn new(config: LedgerConfig) -> Result<LedgerService> {
        let store: Option<Box<dyn LedgerStore>> = match &config.persistence.path {
            Some(path) => Some(Box::new(SledStore::open(path)?)),
            None => None,
        };
        Self::build(config, store)
    }

    /// In-memory only; nothing is mirrored.
    pub fn in_memory(config: LedgerConfig) -> Result<LedgerService> {
        Self::build(config, None)
    }

    pub fn with_store(config: LedgerConfig, store: Box<dyn LedgerStore>) -> Result<LedgerService> {
        Self::build(config, Some(store))
    }

    fn build(config: LedgerConfig, store: Option<Box<dyn LedgerStore>>) -> Result<LedgerService> {
        config.validate()?;
        let ledger = Arc::new(Ledger::new(&config.mining)?);
        let registry = Arc::new(InMemoryRegistry::new());
        let accounts: Arc<dyn AccountRegistry> = registry.clone();
        let builder = TransactionBuilder::new(ledger.clone(), accounts, &config.levy.pool_account);

        let mut levies: BTreeMap<String, Vec<LevyRecord>> = BTreeMap::new();
        let persistence = match store {
            Some(store) => {
                let accounts = store.load_accounts()?;
                info!("Restored {} accounts", accounts.len());
                for account in accounts {
                    registry.register(&account.public_key, account.encrypted_private_key)?;
                }
                let restored = store.load_utxos()?;
                ledger.restore_utxos(restored);

                let mut records = store.load_levies()?;
                records.sort_by(|a, b| {
                    a.levied_at
                        .cmp(&b.levied_at)
                        .then_with(|| a.tx_id.cmp(&b.tx_id))
                });
                for record in records {
                    levies.entry(record.account_id.clone()).or_default().push(record);
                }
                Some(PersistenceQueue::start(
                    store,
                    config.persistence.queue_capacity,
                )?)
            }
            None => None,
        };

        Ok(LedgerService {
            config,
            ledger,
            registry,
            builder,
            levies: RwLock::new(levies),
            persistence,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<InMemoryRegistry> {
        &self.registry
    }

    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    pub fn pool_account(&self) -> &str {
        &self.config.levy.pool_account
    }

    /// Registers a public key. A first-time account with no balance gets the
    /// configured faucet grant.
    pub fn register_account(
        &self,
        public_key: &str,
        encrypted_private_key: Option<String>,
    ) -> Result<AccountRecord> {
        let account_id = derive_account_id(public_key)?;
        let is_new = !self.registry.contains(&account_id);
        let record = self.registry.register(public_key, encrypted_private_key)?;
        if let Some(queue) = &self.persistence {
            queue.save_account(record.clone());
        }

        if is_new && self.config.faucet_amount > 0 && self.ledger.balance(&account_id) == 0 {
            let utxo = self
                .ledger
                .grant_faucet(&account_id, self.config.faucet_amount)?;
            if let Some(queue) = &self.persistence {
                queue.save_utxo(utxo);
                queue.update_balance(&account_id, self.ledger.balance(&account_id));
            }
        }
        info!("Registered account {account_id}");
        Ok(record)
    }

    /// Builds, validates and queues a transfer. Returns the transaction id.
    pub fn submit_transfer(&self, request: TransferRequest) -> Result<String> {
        let sender = self.registry.require(&request.sender_id)?;
        let private_key = match &request.credentials {
            Credentials::PrivateKey(key) => Zeroizing::new(key.clone()),
            Credentials::Passphrase(passphrase) => {
                let blob = sender.encrypted_private_key.as_deref().ok_or_else(|| {
                    LedgerError::Encryption(format!(
                        "No stored key for account {}",
                        sender.account_id
                    ))
                })?;
                decrypt_private_key(blob, passphrase)?
            }
        };

        let tx = self.builder.build_transfer(
            &request.sender_id,
            &request.receiver_id,
            request.amount,
            &request.note,
            &sender.public_key,
            &private_key,
        )?;
        self.builder.validate(&tx)?;

        let id = tx.id.clone();
        self.ledger.append_pending(tx.clone());
        if let Some(queue) = &self.persistence {
            queue.save_transaction(tx, TxStatus::Pending);
        }
        info!(
            "Accepted transfer {id}: {} from {} to {}",
            request.amount, request.sender_id, request.receiver_id
        );
        Ok(id)
    }

    /// Queues a ledger-authored transaction (levy) without validation.
    pub fn submit_system(&self, tx: Transaction) -> String {
        let id = tx.id.clone();
        self.ledger.append_pending(tx.clone());
        if let Some(queue) = &self.persistence {
            queue.save_transaction(tx, TxStatus::Pending);
        }
        id
    }

    pub fn balance(&self, account_id: &str) -> u64 {
        self.ledger.balance(account_id)
    }

    fn check_miner(&self, miner_account: &str) -> Result<()> {
        if self.registry.contains(miner_account) || miner_account == self.pool_account() {
            Ok(())
        } else {
            Err(LedgerError::AccountNotFound(miner_account.to_string()))
        }
    }

    /// Seals pending transactions, holding the ledger lock while mining.
    pub fn seal(&self, miner_account: &str) -> Result<Block> {
        self.check_miner(miner_account)?;
        let block = self.ledger.seal(miner_account)?;
        self.mirror_block(&block);
        Ok(block)
    }

    /// Seals with the nonce search outside the ledger lock.
    pub fn seal_concurrent(&self, miner_account: &str) -> Result<Block> {
        self.check_miner(miner_account)?;
        let block = self.ledger.seal_concurrent(miner_account)?;
        self.mirror_block(&block);
        Ok(block)
    }

    fn mirror_block(&self, block: &Block) {
        let Some(queue) = &self.persistence else {
            return;
        };
        queue.save_block(block.clone());

        let status = TxStatus::Confirmed {
            block_index: block.get_index(),
        };
        let mut accounts = BTreeSet::new();
        for tx in block.get_transactions() {
            queue.save_transaction(tx.clone(), status);

            let created = (0..tx.outputs.len()).map(|idx| UtxoRef::new(&tx.id, idx as u32));
            for outpoint in tx.inputs.iter().cloned().chain(created) {
                match self.ledger.utxo(&outpoint) {
                    Some(utxo) => queue.save_utxo(utxo),
                    None => warn!("UTXO {outpoint} vanished before it could be mirrored"),
                }
            }
            accounts.extend(tx.affected_accounts());
        }
        accounts.remove(COINBASE_SENDER);
        for account in accounts {
            queue.update_balance(&account, self.ledger.balance(&account));
        }
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.ledger.pending_snapshot()
    }

    pub fn chain(&self) -> Vec<Block> {
        self.ledger.chain()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        self.ledger.block(index)
    }

    pub fn unspent_outputs(&self, account_id: &str) -> Vec<Utxo> {
        self.ledger.unspent_outputs(account_id)
    }

    pub fn transaction_status(&self, tx_id: &str) -> Option<TxStatus> {
        self.ledger.transaction_status(tx_id)
    }

    pub fn verify_chain(&self) -> Result<()> {
        self.ledger.verify_chain()
    }

    /// Adds a confirmed levy to the account's history and mirrors it.
    pub fn record_levy(&self, record: LevyRecord) {
        if let Some(queue) = &self.persistence {
            queue.save_levy(record.clone());
        }
        self.levies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(record.account_id.clone())
            .or_default()
            .push(record);
    }

    /// Levies confirmed against an account, oldest first.
    pub fn levy_history(&self, account_id: &str) -> Vec<LevyRecord> {
        self.levies
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(account_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Waits for queued mirror writes. True when there is nothing to wait for.
    pub fn flush_persistence(&self) -> bool {
        self.persistence.as_ref().map_or(true, PersistenceQueue::flush)
    }

    pub fn persistence_stats(&self) -> Option<PersistenceStats> {
        self.persistence.as_ref().map(PersistenceQueue::stats)
    }
}
