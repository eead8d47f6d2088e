use crate::error::{LedgerError, Result};
use crate::levy::LevyEngine;
use crate::service::{Credentials, LedgerService, TransferRequest};
use clap::{Parser, Subcommand};
use std::sync::Arc;

/// One line typed into the `run` console
#[derive(Debug, Parser)]
#[command(name = "console", no_binary_name = true, disable_help_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug)]
enum ConsoleCommand {
    /// Register a public key (grants the faucet to new accounts)
    Register {
        public_key: String,
        #[arg(long = "encrypted-key")]
        encrypted_key: Option<String>,
    },
    /// Queue a signed transfer
    Transfer {
        from: String,
        to: String,
        amount: u64,
        #[arg(long = "private-key", conflicts_with = "passphrase")]
        private_key: Option<String>,
        #[arg(long = "passphrase")]
        passphrase: Option<String>,
        #[arg(long = "note", default_value = "")]
        note: String,
    },
    /// Seal pending transactions; the reward defaults to the levy miner account
    Seal { miner: Option<String> },
    Balance { account: String },
    Pending,
    /// Run a levy cycle now
    Levy,
    History { account: String },
    Chain,
    Quit,
}

/// Line-oriented front end over a running ledger.
pub struct Console {
    service: Arc<LedgerService>,
    engine: Arc<LevyEngine>,
}

impl Console {
    pub fn new(service: Arc<LedgerService>, engine: Arc<LevyEngine>) -> Console {
        Console { service, engine }
    }

    /// Runs one command line. `Ok(None)` means the session should end.
    pub fn execute(&self, line: &str) -> Result<Option<String>> {
        let parsed = ConsoleLine::try_parse_from(line.split_whitespace())
            .map_err(|e| LedgerError::InvalidCommand(e.to_string().trim().to_string()))?;

        let output = match parsed.command {
            ConsoleCommand::Register {
                public_key,
                encrypted_key,
            } => {
                let record = self.service.register_account(&public_key, encrypted_key)?;
                format!(
                    "registered {} (balance {})",
                    record.account_id,
                    self.service.balance(&record.account_id)
                )
            }
            ConsoleCommand::Transfer {
                from,
                to,
                amount,
                private_key,
                passphrase,
                note,
            } => {
                let credentials = match (private_key, passphrase) {
                    (Some(key), None) => Credentials::PrivateKey(key),
                    (None, Some(passphrase)) => Credentials::Passphrase(passphrase),
                    _ => {
                        return Err(LedgerError::InvalidCommand(
                            "transfer needs --private-key or --passphrase".to_string(),
                        ))
                    }
                };
                let id = self.service.submit_transfer(TransferRequest {
                    sender_id: from,
                    receiver_id: to,
                    amount,
                    note,
                    credentials,
                })?;
                format!("queued {id}")
            }
            ConsoleCommand::Seal { miner } => {
                let miner = miner.unwrap_or_else(|| {
                    self.service.config().levy.miner_account().to_string()
                });
                let block = self.service.seal(&miner)?;
                format!(
                    "sealed block #{} with {} transactions: {}",
                    block.get_index(),
                    block.get_transactions().len(),
                    block.get_hash()
                )
            }
            ConsoleCommand::Balance { account } => {
                format!("{account}: {}", self.service.balance(&account))
            }
            ConsoleCommand::Pending => {
                let mut out = format!("{} pending", self.service.pending().len());
                for tx in self.service.pending() {
                    out.push_str(&format!(
                        "\n  {} [{}] {} -> {}: {}",
                        tx.id, tx.kind, tx.sender_id, tx.receiver_id, tx.amount
                    ));
                }
                out
            }
            ConsoleCommand::Levy => {
                let report = self.engine.run_cycle()?;
                if let Some(e) = report.seal_error {
                    return Err(e);
                }
                format!(
                    "levy cycle: {} eligible, {} levied, {} failed",
                    report.eligible,
                    report.levied.len(),
                    report.failed.len()
                )
            }
            ConsoleCommand::History { account } => {
                let history = self.service.levy_history(&account);
                let mut out = format!("{} levies for {account}", history.len());
                for record in history {
                    out.push_str(&format!(
                        "\n  block #{} {}: {} of {}",
                        record.block_index, record.tx_id, record.amount, record.balance
                    ));
                }
                out
            }
            ConsoleCommand::Chain => format!(
                "height {} tip {}",
                self.service.ledger().height(),
                self.service.ledger().tip_hash()
            ),
            ConsoleCommand::Quit => return Ok(None),
        };
        Ok(Some(output))
    }
}
