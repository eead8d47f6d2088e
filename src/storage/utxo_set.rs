use crate::core::{Utxo, UtxoRef};
use log::warn;
use std::collections::HashMap;

/// Every output the ledger has created, keyed by (origin tx, index).
///
/// Spent outputs stay in the set with `spent = true`. The set itself is not
/// synchronized; the ledger owns it behind its state lock.
#[derive(Debug, Default, Clone)]
pub struct UtxoSet {
    outputs: HashMap<UtxoRef, Utxo>,
}

impl UtxoSet {
    pub fn new() -> UtxoSet {
        UtxoSet::default()
    }

    pub fn get(&self, outpoint: &UtxoRef) -> Option<&Utxo> {
        self.outputs.get(outpoint)
    }

    pub fn is_unspent(&self, outpoint: &UtxoRef) -> bool {
        self.outputs.get(outpoint).is_some_and(|utxo| !utxo.spent)
    }

    /// Inserts or replaces the output at `utxo.outpoint()`.
    pub fn insert(&mut self, utxo: Utxo) {
        self.outputs.insert(utxo.outpoint(), utxo);
    }

    /// Returns false if the output is unknown or was already spent.
    pub fn mark_spent(&mut self, outpoint: &UtxoRef) -> bool {
        match self.outputs.get_mut(outpoint) {
            Some(utxo) if !utxo.spent => {
                utxo.spent = true;
                true
            }
            Some(_) => {
                warn!("UTXO {outpoint} already spent");
                false
            }
            None => {
                warn!("UTXO {outpoint} not found");
                false
            }
        }
    }

    pub fn unspent_for(&self, owner: &str) -> Vec<Utxo> {
        self.outputs
            .values()
            .filter(|utxo| !utxo.spent && utxo.owner == owner)
            .cloned()
            .collect()
    }

    /// Sum of the owner's unspent outputs.
    pub fn balance_of(&self, owner: &str) -> u64 {
        self.outputs
            .values()
            .filter(|utxo| !utxo.spent && utxo.owner == owner)
            .fold(0u64, |total, utxo| total.saturating_add(utxo.amount))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn unspent_count(&self) -> usize {
        self.outputs.values().filter(|utxo| !utxo.spent).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.outputs.values()
    }
}
