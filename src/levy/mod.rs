//! Periodic levy
//!
//! On every tick the [`LevyEngine`] deducts a percentage of each eligible
//! balance into the pool account as a ledger-authored transaction, then seals.
//! [`LevyScheduler`] drives it from a background thread.

pub mod engine;
pub mod scheduler;

pub use engine::{levy_amount, LevyCharge, LevyEngine, LevyReport};
pub use scheduler::{LevyHandle, LevyScheduler};
