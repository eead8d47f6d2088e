// Entry point for the levy-chain CLI
use clap::Parser;
use levy_chain::{
    encrypt_private_key, Command, Console, Credentials, KeyPair, LedgerConfig, LedgerService, LedgerStore,
    LevyEngine, LevyScheduler, Opt, SledStore, TransferRequest,
};
use log::{error, info, LevelFilter};
use std::io::BufRead;
use std::process;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    // Info level shows seals and levy summaries without per-account noise
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();
    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(opt: &Opt) -> levy_chain::Result<LedgerConfig> {
    let mut config = LedgerConfig::load(opt.config.as_deref())?;
    if let Some(difficulty) = opt.difficulty {
        config.mining.difficulty = difficulty;
    }
    if let Some(policy) = opt.policy {
        config.mining.policy = policy.into();
    }
    config.validate()?;
    Ok(config)
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    match &opt.command {
        Command::Keygen { passphrase } => {
            let keys = KeyPair::generate()?;
            println!("Account id:  {}", keys.account_id()?);
            println!("Public key:  {}", keys.public_key);
            println!("Private key: {}", keys.private_key);
            if let Some(passphrase) = passphrase {
                println!(
                    "Encrypted:   {}",
                    encrypt_private_key(&keys.private_key, passphrase)?
                );
            }
        }
        Command::EncryptKey {
            private_key,
            passphrase,
        } => {
            println!("{}", encrypt_private_key(private_key, passphrase)?);
        }
        Command::Simulate { accounts, amount } => {
            let mut config = load_config(&opt)?;
            config.persistence.path = None;
            simulate(config, *accounts, *amount)?;
        }
        Command::Run => {
            let config = load_config(&opt)?;
            run_node(config)?;
        }
        Command::Inspect { db } => {
            let store = SledStore::open(db)?;
            let blocks = store.load_blocks()?;
            if blocks.is_empty() {
                println!("No blocks stored at {}", db.display());
            }
            for block in blocks {
                println!("Block #{}", block.get_index());
                println!("  hash:        {}", block.get_hash());
                println!("  previous:    {}", block.get_previous_hash());
                println!("  merkle root: {}", block.get_merkle_root());
                println!("  nonce:       {}", block.get_nonce());
                for tx in block.get_transactions() {
                    println!(
                        "  - {} [{}] {} -> {}: {}",
                        tx.id, tx.kind, tx.sender_id, tx.receiver_id, tx.amount
                    );
                }
            }
        }
    }
    Ok(())
}

// Registers a ring of accounts, has each one pay the next, seals, runs one
// levy cycle and prints the resulting chain.
fn simulate(config: LedgerConfig, accounts: usize, amount: u64) -> levy_chain::Result<()> {
    let service = Arc::new(LedgerService::in_memory(config)?);
    let mut keys = Vec::with_capacity(accounts);
    for _ in 0..accounts {
        let pair = KeyPair::generate()?;
        let record = service.register_account(&pair.public_key, None)?;
        info!("Registered {} with balance {}", record.account_id, service.balance(&record.account_id));
        keys.push((record.account_id, pair));
    }

    for (i, (sender_id, pair)) in keys.iter().enumerate() {
        let (receiver_id, _) = &keys[(i + 1) % keys.len()];
        if receiver_id == sender_id {
            continue;
        }
        let request = TransferRequest {
            sender_id: sender_id.clone(),
            receiver_id: receiver_id.clone(),
            amount,
            note: format!("simulated transfer #{i}"),
            credentials: Credentials::PrivateKey(pair.private_key.clone()),
        };
        match service.submit_transfer(request) {
            Ok(id) => info!("Submitted {id}"),
            Err(e) => error!("Transfer from {sender_id} rejected: {e}"),
        }
    }

    if let Some((miner, _)) = keys.first() {
        service.seal(miner)?;
    }

    let engine = LevyEngine::new(service.clone());
    let report = engine.run_cycle()?;
    if let Some(e) = &report.seal_error {
        error!("Levy seal failed: {e}");
    }

    service.verify_chain()?;
    println!("{}", serde_json::to_string_pretty(&service.chain())?);
    for (account_id, _) in &keys {
        println!("{account_id}: {}", service.balance(account_id));
    }
    println!("{}: {}", service.pool_account(), service.balance(service.pool_account()));
    Ok(())
}

fn run_node(config: LedgerConfig) -> levy_chain::Result<()> {
    let levy_enabled = config.levy.enabled;
    let tick = Duration::from_secs(config.levy.tick_seconds);
    let service = Arc::new(LedgerService::new(config)?);
    let engine = Arc::new(LevyEngine::new(service.clone()));

    let scheduler = if levy_enabled {
        Some(LevyScheduler::start(engine.clone(), tick)?)
    } else {
        None
    };

    info!(
        "Ledger running at height {} with {} accounts. Commands: register, transfer, seal, \
         balance, pending, levy, history, chain, quit",
        service.ledger().height(),
        service.registry().len()
    );
    let console = Console::new(service.clone(), engine);
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match console.execute(&line) {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => break,
            Err(e) => error!("{e}"),
        }
    }

    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
    service.flush_persistence();
    if let Some(stats) = service.persistence_stats() {
        info!(
            "Mirror writes: {} written, {} dropped, {} failed",
            stats.written, stats.dropped, stats.failed
        );
    }
    Ok(())
}
