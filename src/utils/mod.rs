//! Utility functions and helpers
//!
//! Hashing, hex codecs, timestamps and the bincode helpers the durable
//! store uses.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, hex_decode, hex_encode, sha256_digest, sha256_hex};

pub use serialization::{deserialize, serialize};
