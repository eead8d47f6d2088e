use crate::error::{LedgerError, Result};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use ring::digest::{Context, SHA256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix time in whole seconds, the resolution signed payloads carry.
pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LedgerError::Crypto(format!("System time error: {e}")))?
        .as_secs();

    i64::try_from(duration).map_err(|_| LedgerError::Crypto("Timestamp overflow".to_string()))
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&sha256_digest(data))
}

pub fn hex_encode(data: &[u8]) -> String {
    HEXLOWER.encode(data)
}

pub fn hex_decode(data: &str) -> Result<Vec<u8>> {
    HEXLOWER_PERMISSIVE
        .decode(data.as_bytes())
        .map_err(|e| LedgerError::Crypto(format!("Invalid hex encoding: {e}")))
}
