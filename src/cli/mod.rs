//! Command-line interface
//!
//! Argument parsing for the `levy-chain` binary, and the line console the
//! `run` subcommand reads from stdin.

pub mod commands;
pub mod console;

pub use commands::{Command, MiningPolicyArg, Opt};
pub use console::Console;
