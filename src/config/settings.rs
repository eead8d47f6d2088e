use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DB_PATH_KEY: &str = "LEDGER_DB_PATH";
const DIFFICULTY_KEY: &str = "MINING_DIFFICULTY";
const MAX_ITERATIONS_KEY: &str = "MINING_MAX_ITERATIONS";
const LEVY_TICK_KEY: &str = "LEVY_TICK_SECONDS";

pub const DEFAULT_POOL_ACCOUNT: &str = "LEVY_POOL";
const SECONDS_PER_DAY: i64 = 86_400;

/// What sealing does when the nonce budget runs out before the target is met
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningPolicy {
    /// Fail with `MiningIncomplete`, commit nothing
    #[default]
    Strict,
    /// Commit the best non-conforming hash and log the violation
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Required number of leading '0' hex characters
    pub difficulty: usize,
    pub max_iterations: u64,
    pub reward: u64,
    pub policy: MiningPolicy,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            difficulty: 5,
            max_iterations: 10_000_000,
            reward: 50,
            policy: MiningPolicy::Strict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevyConfig {
    pub enabled: bool,
    /// 250 = 2.5%
    pub rate_basis_points: u64,
    /// Balances below this are exempt
    pub threshold: u64,
    pub interval_days: u32,
    pub tick_seconds: u64,
    pub pool_account: String,
    /// Reward recipient for levy-triggered seals, defaults to the pool
    pub miner_account: Option<String>,
}

impl Default for LevyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_basis_points: 250,
            threshold: 500,
            interval_days: 30,
            tick_seconds: 86_400,
            pool_account: DEFAULT_POOL_ACCOUNT.to_string(),
            miner_account: None,
        }
    }
}

impl LevyConfig {
    pub fn interval_seconds(&self) -> i64 {
        i64::from(self.interval_days) * SECONDS_PER_DAY
    }

    pub fn miner_account(&self) -> &str {
        self.miner_account.as_deref().unwrap_or(&self.pool_account)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Sled directory for the durable mirror; in-memory only when absent
    pub path: Option<PathBuf>,
    pub queue_capacity: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: None,
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub mining: MiningConfig,
    pub levy: LevyConfig,
    pub persistence: PersistenceConfig,
    /// Initial grant for newly registered accounts
    pub faucet_amount: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mining: MiningConfig::default(),
            levy: LevyConfig::default(),
            persistence: PersistenceConfig::default(),
            faucet_amount: 1000,
        }
    }
}

impl LedgerConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<LedgerConfig> {
        let mut config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|e| {
                    LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&contents)?
            }
            None => LedgerConfig::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<LedgerConfig> {
        let config: LedgerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = env::var(DB_PATH_KEY) {
            self.persistence.path = Some(PathBuf::from(path));
        }
        if let Ok(value) = env::var(DIFFICULTY_KEY) {
            self.mining.difficulty = parse_env(DIFFICULTY_KEY, &value)?;
        }
        if let Ok(value) = env::var(MAX_ITERATIONS_KEY) {
            self.mining.max_iterations = parse_env(MAX_ITERATIONS_KEY, &value)?;
        }
        if let Ok(value) = env::var(LEVY_TICK_KEY) {
            self.levy.tick_seconds = parse_env(LEVY_TICK_KEY, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mining.difficulty > 64 {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds the 64 hex characters of a SHA-256 hash",
                self.mining.difficulty
            )));
        }
        if self.mining.max_iterations == 0 {
            return Err(LedgerError::Config(
                "max_iterations must be positive".to_string(),
            ));
        }
        if self.levy.rate_basis_points > 10_000 {
            return Err(LedgerError::Config(format!(
                "levy rate {} bps is above 100%",
                self.levy.rate_basis_points
            )));
        }
        if self.levy.tick_seconds == 0 {
            return Err(LedgerError::Config(
                "levy tick_seconds must be positive".to_string(),
            ));
        }
        if self.levy.pool_account.is_empty() {
            return Err(LedgerError::Config("pool_account is empty".to_string()));
        }
        if self.persistence.queue_capacity == 0 {
            return Err(LedgerError::Config(
                "queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LedgerError::Config(format!("{key} has an invalid value: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_levy_rules() {
        let config = LedgerConfig::default();
        assert_eq!(config.levy.rate_basis_points, 250);
        assert_eq!(config.levy.threshold, 500);
        assert_eq!(config.levy.interval_seconds(), 30 * 86_400);
        assert_eq!(config.levy.miner_account(), DEFAULT_POOL_ACCOUNT);
        assert_eq!(config.mining.difficulty, 5);
        assert_eq!(config.mining.policy, MiningPolicy::Strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml_str(
            r#"
            faucet_amount = 250

            [mining]
            difficulty = 2
            policy = "lenient"

            [levy]
            threshold = 100
            miner_account = "MINER"
            "#,
        )
        .unwrap();

        assert_eq!(config.faucet_amount, 250);
        assert_eq!(config.mining.difficulty, 2);
        assert_eq!(config.mining.policy, MiningPolicy::Lenient);
        assert_eq!(config.mining.reward, 50);
        assert_eq!(config.levy.threshold, 100);
        assert_eq!(config.levy.rate_basis_points, 250);
        assert_eq!(config.levy.miner_account(), "MINER");
        assert_eq!(config.persistence.queue_capacity, 1024);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(LedgerConfig::from_toml_str("[mining]\ndifficulty = 65").is_err());
        assert!(LedgerConfig::from_toml_str("[levy]\nrate_basis_points = 10001").is_err());
        assert!(LedgerConfig::from_toml_str("[persistence]\nqueue_capacity = 0").is_err());
        assert!(LedgerConfig::from_toml_str("[mining]\ndifficulty = \"five\"").is_err());
    }
}
