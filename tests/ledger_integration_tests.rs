//! Ledger integration tests
//!
//! End-to-end checks through the public API: accounting invariants across
//! several seals, the levy scenarios, both mining policies and the durable
//! mirror.

use levy_chain::config::{LedgerConfig, MiningConfig, MiningPolicy};
use levy_chain::core::{Block, Transaction, TxStatus, Utxo};
use levy_chain::error::{LedgerError, Result};
use levy_chain::levy::{LevyEngine, LevyScheduler};
use levy_chain::service::{Credentials, LedgerService, TransferRequest};
use levy_chain::storage::{LedgerStore, LevyRecord, MemoryStore, SledStore};
use levy_chain::wallet::{AccountRecord, KeyPair};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const DAY: i64 = 86_400;

fn config(faucet_amount: u64) -> LedgerConfig {
    LedgerConfig {
        mining: MiningConfig {
            difficulty: 1,
            max_iterations: 200_000,
            reward: 50,
            policy: MiningPolicy::Strict,
        },
        faucet_amount,
        ..LedgerConfig::default()
    }
}

struct Account {
    id: String,
    keys: KeyPair,
}

fn register(service: &LedgerService) -> Account {
    let keys = KeyPair::generate().unwrap();
    let id = service
        .register_account(&keys.public_key, None)
        .unwrap()
        .account_id;
    Account { id, keys }
}

fn transfer(from: &Account, to: &Account, amount: u64) -> TransferRequest {
    TransferRequest {
        sender_id: from.id.clone(),
        receiver_id: to.id.clone(),
        amount,
        note: String::new(),
        credentials: Credentials::PrivateKey(from.keys.private_key.clone()),
    }
}

/// Conservation, no double spend and balance consistency over the whole chain.
fn assert_ledger_invariants(service: &LedgerService) {
    let chain = service.chain();
    let mut spent = HashSet::new();
    let mut known_outputs: HashMap<String, Utxo> = HashMap::new();
    for utxo in service
        .ledger()
        .inspect_utxos(|set| set.iter().cloned().collect::<Vec<_>>())
    {
        known_outputs.insert(utxo.id.clone(), utxo);
    }

    for block in &chain {
        for tx in block.get_transactions() {
            if tx.is_reward() {
                assert!(tx.inputs.is_empty());
                assert_eq!(tx.outputs.len(), 1);
                continue;
            }
            let inputs: u64 = tx
                .inputs
                .iter()
                .map(|input| known_outputs[&input.to_string()].amount)
                .sum();
            let outputs: u64 = tx.outputs.iter().map(|out| out.amount).sum();
            assert_eq!(inputs, outputs, "conservation broken by {}", tx.id);
            for input in &tx.inputs {
                assert!(spent.insert(input.clone()), "{input} spent twice");
                assert!(known_outputs[&input.to_string()].spent);
            }
        }
    }

    let owners: HashSet<String> = known_outputs.values().map(|u| u.owner.clone()).collect();
    for owner in owners {
        let unspent: u64 = known_outputs
            .values()
            .filter(|u| u.owner == owner && !u.spent)
            .map(|u| u.amount)
            .sum();
        assert_eq!(service.balance(&owner), unspent);
    }
    service.verify_chain().unwrap();
}

#[test]
fn test_genesis_and_empty_pool_seal() {
    let service = LedgerService::in_memory(config(0)).unwrap();
    let miner = register(&service);

    let genesis = service.block(0).unwrap();
    assert_eq!(genesis.get_previous_hash(), "0");
    assert!(genesis.get_transactions().is_empty());
    assert_eq!(genesis.get_hash(), genesis.recompute_hash());

    let block = service.seal(&miner.id).unwrap();
    assert_eq!(block.get_transactions().len(), 1);
    assert!(block.get_transactions()[0].is_reward());
    assert!(block.verify_merkle_root());
    assert_eq!(block.get_previous_hash(), genesis.get_hash());
    assert_eq!(service.balance(&miner.id), 50);
}

#[test]
fn test_selection_scenario_70_30_10() {
    let service = LedgerService::in_memory(config(0)).unwrap();
    let alice = register(&service);
    let bob = register(&service);
    service.ledger().restore_utxos(vec![
        Utxo::new("seed-a", 0, &alice.id, 70),
        Utxo::new("seed-b", 0, &alice.id, 30),
        Utxo::new("seed-c", 0, &alice.id, 10),
    ]);

    let first = service.builder().select_unspent_outputs(&alice.id, 65).unwrap();
    let second = service.builder().select_unspent_outputs(&alice.id, 65).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total, 70);

    let id = service.submit_transfer(transfer(&alice, &bob, 65)).unwrap();
    let tx: Transaction = service
        .pending()
        .into_iter()
        .find(|tx| tx.id == id)
        .unwrap();
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.inputs[0].tx_id, "seed-a");
    assert_eq!(tx.outputs[0].owner, bob.id);
    assert_eq!(tx.outputs[0].amount, 65);
    assert_eq!(tx.outputs[1].owner, alice.id);
    assert_eq!(tx.outputs[1].amount, 5);

    service.seal(&bob.id).unwrap();
    assert_eq!(service.balance(&alice.id), 45);
    assert_eq!(service.balance(&bob.id), 65 + 50);
    assert_ledger_invariants(&service);
}

#[test]
fn test_conflicting_transfers_first_writer_wins() {
    let service = LedgerService::in_memory(config(0)).unwrap();
    let alice = register(&service);
    let bob = register(&service);
    let carol = register(&service);
    service.ledger().grant_faucet(&alice.id, 100).unwrap();

    // Both validate against the same committed output
    let first = service.submit_transfer(transfer(&alice, &bob, 60)).unwrap();
    let second = service.submit_transfer(transfer(&alice, &carol, 70)).unwrap();
    assert_eq!(service.pending().len(), 2);

    let block = service.seal(&alice.id).unwrap();
    assert!(block.contains_transaction(&first));
    assert!(!block.contains_transaction(&second));
    assert_eq!(service.transaction_status(&first), Some(TxStatus::Confirmed { block_index: 1 }));
    assert_eq!(service.transaction_status(&second), None);
    assert_eq!(service.balance(&bob.id), 60);
    assert_eq!(service.balance(&carol.id), 0);
    assert_ledger_invariants(&service);
}

#[test]
fn test_concurrent_submissions_preserve_invariants() {
    let service = Arc::new(LedgerService::in_memory(config(1000)).unwrap());
    let accounts: Vec<Arc<Account>> = (0..6).map(|_| Arc::new(register(&service))).collect();

    let handles: Vec<_> = (0..accounts.len())
        .map(|i| {
            let service = service.clone();
            let from = accounts[i].clone();
            let to = accounts[(i + 1) % accounts.len()].clone();
            thread::spawn(move || {
                // A seal can spend the selected output before validation; that
                // submission is rejected and the ledger stays consistent.
                for amount in [100, 200, 300] {
                    let _ = service.submit_transfer(transfer(&from, &to, amount));
                }
            })
        })
        .collect();

    let sealer = {
        let service = service.clone();
        let miner = accounts[0].id.clone();
        thread::spawn(move || {
            for _ in 0..3 {
                service.seal_concurrent(&miner).unwrap();
            }
        })
    };
    for handle in handles {
        handle.join().unwrap();
    }
    sealer.join().unwrap();
    while !service.pending().is_empty() {
        service.seal(&accounts[0].id).unwrap();
    }

    let total: u64 = accounts.iter().map(|a| service.balance(&a.id)).sum();
    let rewards = 50 * (service.chain().len() as u64 - 1);
    assert_eq!(total, 6 * 1000 + rewards);
    assert_ledger_invariants(&service);
}

#[test]
fn test_levy_scenarios() {
    let service = Arc::new(LedgerService::in_memory(config(0)).unwrap());
    let rich = register(&service);
    let poor = register(&service);
    let recent = register(&service);
    service.ledger().grant_faucet(&rich.id, 1000).unwrap();
    service.ledger().grant_faucet(&poor.id, 400).unwrap();
    service.ledger().grant_faucet(&recent.id, 1000).unwrap();

    let engine = LevyEngine::new(service.clone());
    let now = 1_700_000_000;
    engine.record_levy(&recent.id, now - 15 * DAY);

    let report = engine.run_cycle_at(now);
    assert_eq!(report.levied.len(), 1);
    assert_eq!(report.levied[0].account_id, rich.id);
    assert_eq!(report.levied[0].amount, 25);
    assert!(report.failed.is_empty());

    let block = report.block.expect("levy cycle seals a block");
    let levy = block
        .get_transactions()
        .iter()
        .find(|tx| tx.id == report.levied[0].tx_id)
        .unwrap();
    assert_eq!(levy.sender_id, rich.id);
    assert_eq!(levy.signature, "system");
    assert_eq!(levy.outputs[0].amount, 25);
    assert_eq!(levy.outputs[1].amount, 975);

    assert_eq!(service.balance(&rich.id), 975);
    assert_eq!(service.balance(&poor.id), 400);
    assert_eq!(service.balance(&recent.id), 1000);
    assert_eq!(engine.last_levied_at(&poor.id), None);
    assert_eq!(engine.last_levied_at(&recent.id), Some(now - 15 * DAY));
    assert_ledger_invariants(&service);
}

#[test]
fn test_strict_mining_failure_changes_nothing() {
    let mut cfg = config(0);
    cfg.mining.difficulty = 64;
    cfg.mining.max_iterations = 10;
    let service = LedgerService::in_memory(cfg).unwrap();
    let alice = register(&service);
    let bob = register(&service);
    service.ledger().grant_faucet(&alice.id, 100).unwrap();
    service.submit_transfer(transfer(&alice, &bob, 10)).unwrap();

    let err = service.seal(&alice.id).unwrap_err();
    assert!(matches!(err, LedgerError::MiningIncomplete { .. }));
    assert_eq!(service.chain().len(), 1);
    assert_eq!(service.pending().len(), 1);
    assert_eq!(service.balance(&alice.id), 100);
}

#[test]
fn test_lenient_mining_commits_best_hash() {
    let mut cfg = config(0);
    cfg.mining.difficulty = 64;
    cfg.mining.max_iterations = 10;
    cfg.mining.policy = MiningPolicy::Lenient;
    let service = LedgerService::in_memory(cfg).unwrap();
    let alice = register(&service);
    let bob = register(&service);
    service.ledger().grant_faucet(&alice.id, 100).unwrap();
    service.submit_transfer(transfer(&alice, &bob, 10)).unwrap();

    let block = service.seal(&alice.id).unwrap();
    assert!(!block.get_hash().starts_with(&"0".repeat(64)));
    assert_eq!(block.get_hash(), block.recompute_hash());
    assert_eq!(service.balance(&bob.id), 10);
    assert!(service.pending().is_empty());
}

struct BrokenStore;

impl LedgerStore for BrokenStore {
    fn save_block(&self, _block: &Block) -> Result<()> {
        Err(LedgerError::Database("connection refused".to_string()))
    }
    fn save_transaction(&self, _tx: &Transaction, _status: TxStatus) -> Result<()> {
        Err(LedgerError::Database("connection refused".to_string()))
    }
    fn save_utxo(&self, _utxo: &Utxo) -> Result<()> {
        Err(LedgerError::Database("connection refused".to_string()))
    }
    fn update_balance(&self, _account_id: &str, _balance: u64) -> Result<()> {
        Err(LedgerError::Database("connection refused".to_string()))
    }
    fn save_account(&self, _account: &AccountRecord) -> Result<()> {
        Err(LedgerError::Database("connection refused".to_string()))
    }
    fn save_levy(&self, _record: &LevyRecord) -> Result<()> {
        Err(LedgerError::Database("connection refused".to_string()))
    }
    fn load_utxos(&self) -> Result<Vec<Utxo>> {
        Ok(vec![])
    }
    fn load_blocks(&self) -> Result<Vec<Block>> {
        Ok(vec![])
    }
    fn load_accounts(&self) -> Result<Vec<AccountRecord>> {
        Ok(vec![])
    }
    fn load_levies(&self) -> Result<Vec<LevyRecord>> {
        Ok(vec![])
    }
}

#[test]
fn test_persistence_failure_is_not_propagated() {
    let service = LedgerService::with_store(config(1000), Box::new(BrokenStore)).unwrap();
    let alice = register(&service);
    let bob = register(&service);

    service.submit_transfer(transfer(&alice, &bob, 250)).unwrap();
    let block = service.seal(&alice.id).unwrap();
    assert_eq!(block.get_transactions().len(), 2);
    assert_eq!(service.balance(&bob.id), 1250);

    assert!(service.flush_persistence());
    let stats = service.persistence_stats().unwrap();
    assert!(stats.failed > 0);
    assert_eq!(stats.written, 0);
}

#[test]
fn test_memory_mirror_tracks_confirmations() {
    let store = MemoryStore::new();
    let service = LedgerService::with_store(config(1000), Box::new(store.clone())).unwrap();
    let alice = register(&service);
    let bob = register(&service);

    let id = service.submit_transfer(transfer(&alice, &bob, 300)).unwrap();
    service.flush_persistence();
    assert_eq!(store.transaction(&id).unwrap().status, TxStatus::Pending);

    service.seal(&bob.id).unwrap();
    service.flush_persistence();
    assert_eq!(store.transaction(&id).unwrap().block_index(), Some(1));
    assert_eq!(store.balance(&alice.id), Some(700));
    assert_eq!(store.balance(&bob.id), Some(1350));
}

#[test]
fn test_sled_mirror_restores_utxos() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger");
    let mut cfg = config(1000);
    cfg.persistence.path = Some(path.clone());

    let (alice_id, bob_id) = {
        let service = LedgerService::new(cfg.clone()).unwrap();
        let alice = register(&service);
        let bob = register(&service);
        service.submit_transfer(transfer(&alice, &bob, 400)).unwrap();
        service.seal(&alice.id).unwrap();
        assert!(service.flush_persistence());
        (alice.id, bob.id)
    };

    let blocks = SledStore::open(&path).unwrap().load_blocks().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].get_index(), 1);

    let service = LedgerService::new(cfg).unwrap();
    assert_eq!(service.balance(&alice_id), 650);
    assert_eq!(service.balance(&bob_id), 1400);
}

#[test]
fn test_sled_restart_keeps_accounts_and_levy_history() {
    let dir = tempdir().unwrap();
    let mut cfg = config(1000);
    cfg.persistence.path = Some(dir.path().join("ledger"));
    let start = 1_700_000_000;

    let (alice, bob) = {
        let service = Arc::new(LedgerService::new(cfg.clone()).unwrap());
        let alice = register(&service);
        let bob = register(&service);
        let engine = LevyEngine::new(service.clone());
        let report = engine.run_cycle_at(start);
        assert_eq!(report.levied.len(), 2);
        assert!(service.flush_persistence());
        (alice, bob)
    };

    let service = Arc::new(LedgerService::new(cfg).unwrap());
    assert_eq!(service.registry().len(), 2);
    assert_eq!(service.balance(&alice.id), 975);
    assert_eq!(service.levy_history(&alice.id).len(), 1);

    // Restored holders can still send
    service.submit_transfer(transfer(&alice, &bob, 475)).unwrap();
    service.seal(&alice.id).unwrap();
    assert_eq!(service.balance(&alice.id), 550);
    assert_eq!(service.balance(&bob.id), 975 + 475);

    // The cooling interval carries over; a month later both are levied again
    let engine = LevyEngine::new(service.clone());
    assert!(engine.run_cycle_at(start + DAY).levied.is_empty());
    let report = engine.run_cycle_at(start + 30 * DAY);
    assert_eq!(report.levied.len(), 2);
    let history = service.levy_history(&bob.id);
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].balance, 1450);
    assert_eq!(history[1].amount, 36);
}

#[test]
fn test_scheduler_levies_restored_account() {
    let dir = tempdir().unwrap();
    let mut cfg = config(1000);
    cfg.persistence.path = Some(dir.path().join("ledger"));

    let alice = {
        let service = LedgerService::new(cfg.clone()).unwrap();
        let alice = register(&service);
        assert!(service.flush_persistence());
        alice
    };

    let service = Arc::new(LedgerService::new(cfg).unwrap());
    let engine = Arc::new(LevyEngine::new(service.clone()));
    let handle = LevyScheduler::start(engine, Duration::from_millis(20)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while service.levy_history(&alice.id).is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    handle.stop();

    assert_eq!(service.levy_history(&alice.id).len(), 1);
    assert_eq!(service.balance(&alice.id), 975);
}
