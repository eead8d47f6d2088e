use crate::error::{LedgerError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use zeroize::ZeroizeOnDrop;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Key material that is wiped from memory on drop
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureKey {
    key: Vec<u8>,
}

impl SecureKey {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl std::fmt::Debug for SecureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureKey")
            .field("length", &self.key.len())
            .finish()
    }
}

/// AES-256-GCM with a fresh random nonce per message
pub struct Aes256GcmCipher {
    cipher: Aes256Gcm,
}

impl Aes256GcmCipher {
    pub fn new(key: &SecureKey) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(LedgerError::Encryption(
                "AES-256-GCM requires a 32-byte key".to_string(),
            ));
        }
        let aes_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
        Ok(Self {
            cipher: Aes256Gcm::new(aes_key),
        })
    }

    /// Returns (nonce, ciphertext).
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| LedgerError::Encryption(format!("AES-256-GCM encryption failed: {e}")))?;
        Ok((nonce_bytes, ciphertext))
    }

    pub fn decrypt(&self, nonce_bytes: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if nonce_bytes.len() != NONCE_LEN {
            return Err(LedgerError::Encryption(
                "AES-256-GCM requires a 12-byte nonce".to_string(),
            ));
        }
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| LedgerError::Encryption(format!("AES-256-GCM decryption failed: {e}")))
    }
}
