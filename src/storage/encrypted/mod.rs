//! Private key protection
//!
//! Only private keys need encryption; blocks and transactions are public.

pub mod cipher;
pub mod vault;

pub use cipher::{Aes256GcmCipher, SecureKey};
pub use vault::{decrypt_private_key, encrypt_private_key};
