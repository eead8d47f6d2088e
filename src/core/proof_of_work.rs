use crate::config::{MiningConfig, MiningPolicy};
use crate::core::Block;
use crate::error::{LedgerError, Result};
use crate::utils::sha256_hex;
use log::{info, warn};

/// Result of one bounded nonce search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningOutcome {
    pub nonce: u64,
    pub hash: String,
    pub iterations: u64,
    pub meets_target: bool,
}

/// Proof-of-work: find a nonce whose block hash starts with `difficulty`
/// hex zeros, giving up after `max_iterations` attempts.
#[derive(Debug, Clone)]
pub struct Miner {
    difficulty: usize,
    max_iterations: u64,
    policy: MiningPolicy,
    target_prefix: String,
}

impl Miner {
    pub fn new(config: &MiningConfig) -> Miner {
        Miner {
            difficulty: config.difficulty,
            max_iterations: config.max_iterations,
            policy: config.policy,
            target_prefix: "0".repeat(config.difficulty),
        }
    }

    pub fn get_difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn get_max_iterations(&self) -> u64 {
        self.max_iterations
    }

    pub fn get_policy(&self) -> MiningPolicy {
        self.policy
    }

    pub fn meets_difficulty(&self, hash: &str) -> bool {
        hash.starts_with(&self.target_prefix)
    }

    /// Validate proof-of-work for a sealed block
    pub fn validate(&self, block: &Block) -> bool {
        block.recompute_hash() == block.get_hash() && self.meets_difficulty(block.get_hash())
    }

    /// Tries nonces `start_nonce..start_nonce + max_iterations`. If none
    /// meets the target, returns the hash with the most leading zeros seen.
    pub fn search(&self, block: &Block, start_nonce: u64) -> MiningOutcome {
        let prefix = block.hashing_prefix();
        let mut best: Option<(usize, u64, String)> = None;

        for attempt in 0..self.max_iterations {
            let nonce = start_nonce.wrapping_add(attempt);
            let hash = sha256_hex(format!("{prefix}{nonce}").as_bytes());
            if self.meets_difficulty(&hash) {
                return MiningOutcome {
                    nonce,
                    hash,
                    iterations: attempt + 1,
                    meets_target: true,
                };
            }

            let zeros = leading_zeros(&hash);
            if best.as_ref().map_or(true, |(best_zeros, _, _)| zeros > *best_zeros) {
                best = Some((zeros, nonce, hash));
            }
        }

        let (nonce, hash) = match best {
            Some((_, nonce, hash)) => (nonce, hash),
            // A zero budget still yields a hash for the starting nonce
            None => (start_nonce, block.hash_with_nonce(start_nonce)),
        };
        MiningOutcome {
            nonce,
            hash,
            iterations: self.max_iterations,
            meets_target: false,
        }
    }

    /// Runs the search and applies the mining policy to an exhausted budget.
    ///
    /// Under `Strict` an unmet target is `MiningIncomplete` and the block is
    /// discarded. Under `Lenient` the best hash found is committed anyway.
    pub fn seal(&self, mut block: Block) -> Result<Block> {
        info!(
            "Mining block #{} ({} transactions, difficulty {})",
            block.get_index(),
            block.get_transactions().len(),
            self.difficulty
        );
        let outcome = self.search(&block, 0);

        if !outcome.meets_target {
            match self.policy {
                MiningPolicy::Strict => {
                    warn!(
                        "Mining block #{} gave up after {} iterations",
                        block.get_index(),
                        outcome.iterations
                    );
                    return Err(LedgerError::MiningIncomplete {
                        iterations: outcome.iterations,
                        best_hash: outcome.hash,
                    });
                }
                MiningPolicy::Lenient => {
                    warn!(
                        "Mining block #{} hit the iteration limit, committing best hash {}",
                        block.get_index(),
                        outcome.hash
                    );
                }
            }
        }

        info!(
            "Mined block #{} with nonce {}: {}",
            block.get_index(),
            outcome.nonce,
            outcome.hash
        );
        block.set_seal(outcome.nonce, outcome.hash);
        Ok(block)
    }
}

pub fn leading_zeros(hash: &str) -> usize {
    hash.chars().take_while(|c| *c == '0').count()
}
