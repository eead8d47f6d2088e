use crate::config::MiningPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// What to do when the nonce search runs out of iterations
#[derive(Debug, Clone, Copy)]
pub enum MiningPolicyArg {
    Strict,
    Lenient,
}

impl FromStr for MiningPolicyArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(MiningPolicyArg::Strict),
            "lenient" => Ok(MiningPolicyArg::Lenient),
            _ => Err(format!(
                "Invalid mining policy: {s}. Valid options: strict, lenient"
            )),
        }
    }
}

impl std::fmt::Display for MiningPolicyArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiningPolicyArg::Strict => write!(f, "strict"),
            MiningPolicyArg::Lenient => write!(f, "lenient"),
        }
    }
}

impl From<MiningPolicyArg> for MiningPolicy {
    fn from(arg: MiningPolicyArg) -> Self {
        match arg {
            MiningPolicyArg::Strict => MiningPolicy::Strict,
            MiningPolicyArg::Lenient => MiningPolicy::Lenient,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "levy-chain")]
pub struct Opt {
    #[arg(long = "config", global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,
    #[arg(
        long = "difficulty",
        global = true,
        help = "Override the number of leading hex zeros a block hash needs"
    )]
    pub difficulty: Option<usize>,
    #[arg(
        long = "policy",
        global = true,
        help = "Mining policy when the iteration budget runs out (strict, lenient)"
    )]
    pub policy: Option<MiningPolicyArg>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "keygen", about = "Generate an Ed25519 keypair and its account id")]
    Keygen {
        #[arg(long = "passphrase", help = "Also print the private key encrypted under this passphrase")]
        passphrase: Option<String>,
    },
    #[command(name = "encrypt-key", about = "Encrypt a hex private key with a passphrase")]
    EncryptKey {
        #[arg(help = "Hex private key")]
        private_key: String,
        #[arg(help = "Passphrase (at least 8 characters)")]
        passphrase: String,
    },
    #[command(
        name = "simulate",
        about = "In-memory run: register accounts, transfer, seal, levy, print the chain"
    )]
    Simulate {
        #[arg(long = "accounts", default_value_t = 3, help = "Number of accounts to register")]
        accounts: usize,
        #[arg(long = "amount", default_value_t = 100, help = "Amount each account sends to the next")]
        amount: u64,
    },
    #[command(
        name = "run",
        about = "Start the ledger and the levy scheduler, then read console commands from stdin"
    )]
    Run,
    #[command(name = "inspect", about = "Print the blocks stored in a ledger mirror")]
    Inspect {
        #[arg(help = "Path to the sled database")]
        db: PathBuf,
    },
}
