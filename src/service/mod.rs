//! Caller-facing operations
//!
//! [`LedgerService`] is what a request/response layer talks to: it wires the
//! ledger, the account registry, the transaction builder and the durable
//! mirror together.

pub mod ledger_service;

pub use ledger_service::{Credentials, LedgerService, TransferRequest};
