//! Helpers shared by the unit tests

use crate::config::{LedgerConfig, MiningConfig, MiningPolicy};
use crate::service::{Credentials, LedgerService, TransferRequest};
use crate::wallet::KeyPair;

/// Cheap mining and no faucet, so tests control every balance.
pub fn test_config() -> LedgerConfig {
    LedgerConfig {
        mining: MiningConfig {
            difficulty: 1,
            max_iterations: 200_000,
            reward: 50,
            policy: MiningPolicy::Strict,
        },
        faucet_amount: 0,
        ..LedgerConfig::default()
    }
}

pub struct TestAccount {
    pub keys: KeyPair,
    pub id: String,
}

impl TestAccount {
    /// Fresh keypair, not registered anywhere
    pub fn new() -> TestAccount {
        let keys = KeyPair::generate().unwrap();
        let id = keys.account_id().unwrap();
        TestAccount { keys, id }
    }

    pub fn register(service: &LedgerService) -> TestAccount {
        let account = TestAccount::new();
        service
            .register_account(&account.keys.public_key, None)
            .unwrap();
        account
    }

    pub fn transfer_to(&self, receiver_id: &str, amount: u64) -> TransferRequest {
        TransferRequest {
            sender_id: self.id.clone(),
            receiver_id: receiver_id.to_string(),
            amount,
            note: "test transfer".to_string(),
            credentials: Credentials::PrivateKey(self.keys.private_key.clone()),
        }
    }
}
