// Private keys at rest: Argon2id stretches the passphrase into an AES-256-GCM key.
// Blob layout before base64: salt (16) ‖ nonce (12) ‖ ciphertext+tag.

use super::cipher::{Aes256GcmCipher, SecureKey, KEY_LEN, NONCE_LEN};
use crate::error::{LedgerError, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use data_encoding::BASE64;
use rand::RngCore;
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 16;
pub const MIN_PASSPHRASE_LEN: usize = 8;

// 19 MiB, 2 passes
const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_ITERATIONS: u32 = 2;

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<SecureKey> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, 1, Some(KEY_LEN))
        .map_err(|e| LedgerError::Encryption(format!("Invalid Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = vec![0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| LedgerError::Encryption(format!("Key derivation failed: {e}")))?;
    Ok(SecureKey::new(key))
}

/// Encrypts a hex private key under `passphrase`.
pub fn encrypt_private_key(private_key_hex: &str, passphrase: &str) -> Result<String> {
    if passphrase.len() < MIN_PASSPHRASE_LEN {
        return Err(LedgerError::Encryption(format!(
            "Passphrase must be at least {MIN_PASSPHRASE_LEN} characters"
        )));
    }

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let cipher = Aes256GcmCipher::new(&derive_key(passphrase, &salt)?)?;
    let (nonce, ciphertext) = cipher.encrypt(private_key_hex.as_bytes())?;

    let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(&blob))
}

/// Inverse of [`encrypt_private_key`]. A wrong passphrase fails GCM
/// authentication and surfaces as `Encryption`.
pub fn decrypt_private_key(blob: &str, passphrase: &str) -> Result<Zeroizing<String>> {
    let bytes = BASE64
        .decode(blob.trim().as_bytes())
        .map_err(|e| LedgerError::Encryption(format!("Malformed key blob: {e}")))?;
    if bytes.len() <= SALT_LEN + NONCE_LEN {
        return Err(LedgerError::Encryption("Key blob too short".to_string()));
    }

    let (salt, rest) = bytes.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    let cipher = Aes256GcmCipher::new(&derive_key(passphrase, salt)?)?;
    let plaintext = Zeroizing::new(cipher.decrypt(nonce, ciphertext)?);

    let key = std::str::from_utf8(&plaintext)
        .map_err(|_| LedgerError::Encryption("Decrypted key is not valid text".to_string()))?;
    Ok(Zeroizing::new(key.to_string()))
}
