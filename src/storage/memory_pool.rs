use crate::core::Transaction;

/// Transactions accepted but not yet sealed, in arrival order.
///
/// Arrival order matters: when two pending transactions spend the same
/// output, the earlier one wins at seal time.
#[derive(Debug, Default, Clone)]
pub struct PendingPool {
    transactions: Vec<Transaction>,
}

impl PendingPool {
    pub fn new() -> PendingPool {
        PendingPool::default()
    }

    pub fn push(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn get(&self, txid: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == txid)
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.get(txid).is_some()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    pub fn retain<F: FnMut(&Transaction) -> bool>(&mut self, keep: F) {
        self.transactions.retain(keep);
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
