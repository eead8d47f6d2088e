// Best-effort mirror of ledger state into a durable store.
//
// Writes are handed to a single writer thread through a bounded channel. The
// caller never waits on the store and never sees its errors: a full queue
// drops the write, a failing store is logged. In-memory state stays
// authoritative either way.

use crate::core::{Block, Transaction, TxStatus, Utxo};
use crate::error::{LedgerError, Result};
use crate::wallet::AccountRecord;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Transaction as mirrored, with the status it had when written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct StoredTransaction {
    pub transaction: Transaction,
    pub status: TxStatus,
}

impl StoredTransaction {
    pub fn block_index(&self) -> Option<u64> {
        self.status.block_index()
    }
}

/// One confirmed levy deduction, kept as the account's levy history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct LevyRecord {
    pub account_id: String,
    pub amount: u64,
    /// Balance the amount was computed from
    pub balance: u64,
    pub tx_id: String,
    pub block_index: u64,
    /// Cycle time, Unix seconds
    pub levied_at: i64,
}

/// Durable-persistence collaborator. Writes are upserts keyed by id.
pub trait LedgerStore: Send {
    fn save_block(&self, block: &Block) -> Result<()>;

    /// `status` carries the block index once confirmed.
    fn save_transaction(&self, tx: &Transaction, status: TxStatus) -> Result<()>;

    fn save_utxo(&self, utxo: &Utxo) -> Result<()>;

    fn update_balance(&self, account_id: &str, balance: u64) -> Result<()>;

    fn save_account(&self, account: &AccountRecord) -> Result<()>;

    fn save_levy(&self, record: &LevyRecord) -> Result<()>;

    fn load_utxos(&self) -> Result<Vec<Utxo>>;

    /// Stored blocks in index order.
    fn load_blocks(&self) -> Result<Vec<Block>>;

    fn load_accounts(&self) -> Result<Vec<AccountRecord>>;

    fn load_levies(&self) -> Result<Vec<LevyRecord>>;
}

enum WriteCommand {
    SaveBlock(Block),
    SaveTransaction(Transaction, TxStatus),
    SaveUtxo(Utxo),
    UpdateBalance(String, u64),
    SaveAccount(AccountRecord),
    SaveLevy(LevyRecord),
    Flush(mpsc::Sender<()>),
}

impl WriteCommand {
    fn apply(self, store: &dyn LedgerStore) -> Result<()> {
        match self {
            WriteCommand::SaveBlock(block) => store.save_block(&block),
            WriteCommand::SaveTransaction(tx, status) => store.save_transaction(&tx, status),
            WriteCommand::SaveUtxo(utxo) => store.save_utxo(&utxo),
            WriteCommand::UpdateBalance(account_id, balance) => {
                store.update_balance(&account_id, balance)
            }
            WriteCommand::SaveAccount(account) => store.save_account(&account),
            WriteCommand::SaveLevy(record) => store.save_levy(&record),
            WriteCommand::Flush(ack) => {
                // The caller may have stopped waiting for the ack
                ack.send(()).ok();
                Ok(())
            }
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersistenceStats {
    pub written: u64,
    pub dropped: u64,
    pub failed: u64,
}

pub struct PersistenceQueue {
    sender: Option<SyncSender<WriteCommand>>,
    worker: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl PersistenceQueue {
    pub fn start(store: Box<dyn LedgerStore>, capacity: usize) -> Result<PersistenceQueue> {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let counters = Arc::new(Counters::default());
        let worker_counters = counters.clone();

        let worker = thread::Builder::new()
            .name("ledger-persistence".to_string())
            .spawn(move || run_writer(store, receiver, worker_counters))
            .map_err(|e| LedgerError::Io(format!("Failed to spawn persistence writer: {e}")))?;

        info!("Persistence writer started (queue capacity {capacity})");
        Ok(PersistenceQueue {
            sender: Some(sender),
            worker: Some(worker),
            counters,
        })
    }

    pub fn save_block(&self, block: Block) {
        self.enqueue(WriteCommand::SaveBlock(block));
    }

    pub fn save_transaction(&self, tx: Transaction, status: TxStatus) {
        self.enqueue(WriteCommand::SaveTransaction(tx, status));
    }

    pub fn save_utxo(&self, utxo: Utxo) {
        self.enqueue(WriteCommand::SaveUtxo(utxo));
    }

    pub fn update_balance(&self, account_id: &str, balance: u64) {
        self.enqueue(WriteCommand::UpdateBalance(account_id.to_string(), balance));
    }

    pub fn save_account(&self, account: AccountRecord) {
        self.enqueue(WriteCommand::SaveAccount(account));
    }

    pub fn save_levy(&self, record: LevyRecord) {
        self.enqueue(WriteCommand::SaveLevy(record));
    }

    fn enqueue(&self, command: WriteCommand) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Persistence queue full, dropped write ({dropped} dropped so far)");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!("Persistence writer is gone, write lost");
            }
        }
    }

    /// Blocks until every write queued before this call has been applied.
    /// Returns false if the writer is no longer running.
    pub fn flush(&self) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        let (ack, done) = mpsc::channel();
        if sender.send(WriteCommand::Flush(ack)).is_err() {
            return false;
        }
        done.recv().is_ok()
    }

    pub fn stats(&self) -> PersistenceStats {
        PersistenceStats {
            written: self.counters.written.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Drains the queue and joins the writer.
    pub fn shutdown(mut self) -> PersistenceStats {
        self.stop();
        self.stats()
    }

    fn stop(&mut self) {
        // Closing the channel ends the writer loop once the backlog is applied
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Persistence writer panicked");
            }
        }
    }
}

impl Drop for PersistenceQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_writer(store: Box<dyn LedgerStore>, receiver: Receiver<WriteCommand>, counters: Arc<Counters>) {
    for command in receiver {
        let is_flush = matches!(command, WriteCommand::Flush(_));
        match command.apply(store.as_ref()) {
            Ok(()) if is_flush => {}
            Ok(()) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!("Persistence write failed: {e}");
            }
        }
    }
    info!("Persistence writer stopped");
}
