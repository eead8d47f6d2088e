//! Configuration management
//!
//! Mining, levy and persistence settings. A [`LedgerConfig`] is built once at
//! startup (TOML file plus environment overrides) and handed to the
//! components that need it.

pub mod settings;

pub use settings::{LedgerConfig, LevyConfig, MiningConfig, MiningPolicy, PersistenceConfig};
