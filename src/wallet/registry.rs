use crate::error::{LedgerError, Result};
use crate::wallet::derive_account_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Resolves account ids to public keys. The ledger only ever reads it.
pub trait AccountRegistry: Send + Sync {
    fn public_key(&self, account_id: &str) -> Option<String>;

    fn contains(&self, account_id: &str) -> bool {
        self.public_key(account_id).is_some()
    }

    /// All known account ids, in a stable order.
    fn account_ids(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct AccountRecord {
    pub account_id: String,
    pub public_key: String,
    /// Output of `encrypt_private_key`, never the raw key
    pub encrypted_private_key: Option<String>,
}

#[derive(Default)]
pub struct InMemoryRegistry {
    accounts: RwLock<BTreeMap<String, AccountRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> InMemoryRegistry {
        InMemoryRegistry::default()
    }

    /// Registers a public key and returns the record keyed by its derived id.
    /// Re-registering the same key replaces the stored encrypted key.
    pub fn register(
        &self,
        public_key: &str,
        encrypted_private_key: Option<String>,
    ) -> Result<AccountRecord> {
        let account_id = derive_account_id(public_key)?;
        let record = AccountRecord {
            account_id: account_id.clone(),
            public_key: public_key.to_lowercase(),
            encrypted_private_key,
        };
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        accounts.insert(account_id, record.clone());
        Ok(record)
    }

    pub fn get(&self, account_id: &str) -> Option<AccountRecord> {
        self.accounts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(account_id)
            .cloned()
    }

    pub fn require(&self, account_id: &str) -> Result<AccountRecord> {
        self.get(account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccountRegistry for InMemoryRegistry {
    fn public_key(&self, account_id: &str) -> Option<String> {
        self.get(account_id).map(|record| record.public_key)
    }

    fn account_ids(&self) -> Vec<String> {
        self.accounts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}
