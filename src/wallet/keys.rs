use crate::error::{LedgerError, Result};
use crate::utils::{hex_decode, hex_encode, sha256_hex};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{Ed25519KeyPair, KeyPair as _, UnparsedPublicKey, ED25519};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SEED_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;
pub const ACCOUNT_ID_LEN: usize = 40;

/// Hex-encoded Ed25519 keypair. The private half is seed ‖ public key (64 bytes).
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl KeyPair {
    pub fn generate() -> Result<KeyPair> {
        let rng = SystemRandom::new();
        let mut seed = [0u8; SEED_LEN];
        rng.fill(&mut seed)
            .map_err(|_| LedgerError::Crypto("Failed to gather randomness".to_string()))?;

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed)
            .map_err(|e| LedgerError::Crypto(format!("Failed to create Ed25519 key: {e}")))?;
        let public_key = key_pair.public_key().as_ref().to_vec();

        let mut private_key = seed.to_vec();
        private_key.extend_from_slice(&public_key);
        let encoded = hex_encode(&private_key);
        seed.zeroize();
        private_key.zeroize();

        Ok(KeyPair {
            public_key: hex_encode(&public_key),
            private_key: encoded,
        })
    }

    pub fn account_id(&self) -> Result<String> {
        derive_account_id(&self.public_key)
    }
}

/// SHA-256 of the raw public key bytes, hex, first 40 characters.
pub fn derive_account_id(public_key_hex: &str) -> Result<String> {
    let public_key = hex_decode(public_key_hex)?;
    if public_key.len() != PUBLIC_KEY_LEN {
        return Err(LedgerError::Crypto(format!(
            "Public key must be {PUBLIC_KEY_LEN} bytes, got {}",
            public_key.len()
        )));
    }
    let mut digest = sha256_hex(&public_key);
    digest.truncate(ACCOUNT_ID_LEN);
    Ok(digest)
}

fn load_key_pair(private_key_hex: &str) -> Result<Ed25519KeyPair> {
    let mut private_key = hex_decode(private_key_hex)?;
    let key_pair = match private_key.len() {
        SEED_LEN => Ed25519KeyPair::from_seed_unchecked(&private_key),
        len if len == SEED_LEN + PUBLIC_KEY_LEN => Ed25519KeyPair::from_seed_and_public_key(
            &private_key[..SEED_LEN],
            &private_key[SEED_LEN..],
        ),
        len => {
            private_key.zeroize();
            return Err(LedgerError::Crypto(format!(
                "Invalid private key size: {len} bytes"
            )));
        }
    };
    private_key.zeroize();
    key_pair.map_err(|e| LedgerError::Crypto(format!("Rejected private key: {e}")))
}

/// Signs `payload`, returning the hex-encoded 64-byte signature.
pub fn sign(private_key_hex: &str, payload: &[u8]) -> Result<String> {
    let key_pair = load_key_pair(private_key_hex)?;
    Ok(hex_encode(key_pair.sign(payload).as_ref()))
}

/// Malformed hex in either argument verifies as false.
pub fn verify(public_key_hex: &str, payload: &[u8], signature_hex: &str) -> bool {
    let (public_key, signature) = match (hex_decode(public_key_hex), hex_decode(signature_hex)) {
        (Ok(public_key), Ok(signature)) => (public_key, signature),
        _ => return false,
    };
    if public_key.len() != PUBLIC_KEY_LEN || signature.len() != SIGNATURE_LEN {
        return false;
    }
    UnparsedPublicKey::new(&ED25519, public_key)
        .verify(payload, &signature)
        .is_ok()
}
