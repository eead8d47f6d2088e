use crate::config::LevyConfig;
use crate::core::{Block, COINBASE_SENDER};
use crate::error::{LedgerError, Result};
use crate::service::LedgerService;
use crate::storage::LevyRecord;
use crate::utils::current_timestamp;
use crate::wallet::AccountRegistry;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// `floor(balance * rate_basis_points / 10_000)` without overflow.
pub fn levy_amount(balance: u64, rate_basis_points: u64) -> u64 {
    (u128::from(balance) * u128::from(rate_basis_points) / 10_000) as u64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevyCharge {
    pub account_id: String,
    pub balance: u64,
    pub amount: u64,
    pub tx_id: String,
}

/// What one cycle did
#[derive(Debug, Default)]
pub struct LevyReport {
    /// Accounts at or above the threshold and outside their cooling interval
    pub eligible: usize,
    pub levied: Vec<LevyCharge>,
    pub failed: Vec<(String, LedgerError)>,
    /// Block sealed at the end of the cycle, if any
    pub block: Option<Block>,
    pub seal_error: Option<LedgerError>,
}

pub struct LevyEngine {
    service: Arc<LedgerService>,
    config: LevyConfig,
    // Held for a whole cycle, which also keeps cycles from overlapping
    last_levied: Mutex<HashMap<String, i64>>,
}

impl LevyEngine {
    /// Cooling intervals resume from the service's levy history, so a
    /// restart does not levy an account early.
    pub fn new(service: Arc<LedgerService>) -> LevyEngine {
        let config = service.config().levy.clone();
        let last_levied = service
            .registry()
            .account_ids()
            .into_iter()
            .filter_map(|account_id| {
                let last = service.levy_history(&account_id).last()?.levied_at;
                Some((account_id, last))
            })
            .collect();
        LevyEngine {
            service,
            config,
            last_levied: Mutex::new(last_levied),
        }
    }

    pub fn config(&self) -> &LevyConfig {
        &self.config
    }

    pub fn last_levied_at(&self, account_id: &str) -> Option<i64> {
        self.last_levied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(account_id)
            .copied()
    }

    /// Seeds the cooling interval for an account, e.g. from a previous run.
    pub fn record_levy(&self, account_id: &str, timestamp: i64) {
        self.last_levied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(account_id.to_string(), timestamp);
    }

    pub fn run_cycle(&self) -> Result<LevyReport> {
        Ok(self.run_cycle_at(current_timestamp()?))
    }

    /// One levy pass over every registered account, as of `now` (Unix seconds).
    ///
    /// Failures for one account are logged and reported; they never stop the
    /// pass. A seal failure at the end is reported too, and the levies stay
    /// pending for the next seal.
    pub fn run_cycle_at(&self, now: i64) -> LevyReport {
        let mut last_levied = self
            .last_levied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut report = LevyReport::default();
        let pool = self.config.pool_account.as_str();
        let interval = self.config.interval_seconds();

        for account_id in self.service.registry().account_ids() {
            if account_id == pool || account_id == COINBASE_SENDER {
                continue;
            }
            if let Some(last) = last_levied.get(&account_id) {
                if now - last < interval {
                    debug!("Skipping {account_id}: levied {}s ago", now - last);
                    continue;
                }
            }
            let balance = self.service.balance(&account_id);
            if balance < self.config.threshold {
                debug!(
                    "Skipping {account_id}: balance {balance} below threshold {}",
                    self.config.threshold
                );
                continue;
            }
            report.eligible += 1;

            let amount = levy_amount(balance, self.config.rate_basis_points);
            if amount == 0 {
                continue;
            }
            match self.service.builder().build_levy(&account_id, amount) {
                Ok(tx) => {
                    let tx_id = self.service.submit_system(tx);
                    last_levied.insert(account_id.clone(), now);
                    report.levied.push(LevyCharge {
                        account_id,
                        balance,
                        amount,
                        tx_id,
                    });
                }
                Err(e) => {
                    warn!("Levy for {account_id} failed: {e}");
                    report.failed.push((account_id, e));
                }
            }
        }

        if self.service.ledger().pending_len() > 0 {
            match self.service.seal(self.config.miner_account()) {
                Ok(block) => {
                    // A levy can lose its inputs to a transfer queued earlier;
                    // that account is retried next cycle.
                    report.levied.retain(|charge| {
                        if block.contains_transaction(&charge.tx_id) {
                            return true;
                        }
                        warn!("Levy {} was dropped at seal time", charge.tx_id);
                        last_levied.remove(&charge.account_id);
                        report.failed.push((
                            charge.account_id.clone(),
                            LedgerError::DoubleSpend(format!("levy {} lost its inputs", charge.tx_id)),
                        ));
                        false
                    });
                    for charge in &report.levied {
                        self.service.record_levy(LevyRecord {
                            account_id: charge.account_id.clone(),
                            amount: charge.amount,
                            balance: charge.balance,
                            tx_id: charge.tx_id.clone(),
                            block_index: block.get_index(),
                            levied_at: now,
                        });
                    }
                    report.block = Some(block);
                }
                Err(e) => {
                    error!("Sealing after levy cycle failed: {e}");
                    report.seal_error = Some(e);
                }
            }
        }

        info!(
            "Levy cycle: {} eligible, {} levied, {} failed",
            report.eligible,
            report.levied.len(),
            report.failed.len()
        );
        report
    }
}
