// Bincode helpers for the values kept in the durable mirror
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| LedgerError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
    struct BalanceRecord {
        account_id: String,
        amount: u64,
        updated_at: i64,
    }

    #[test]
    fn test_record_survives_encoding() {
        let record = BalanceRecord {
            account_id: "a".repeat(40),
            amount: 975,
            updated_at: 1_700_000_000,
        };

        let bytes = serialize(&record).expect("Serialization should work");
        let decoded: BalanceRecord = deserialize(&bytes).expect("Deserialization should work");
        assert_eq!(record, decoded);
    }

    #[test]
    fn test_truncated_bytes_are_rejected() {
        let record = BalanceRecord {
            account_id: "b".repeat(40),
            amount: 25,
            updated_at: 0,
        };
        let bytes = serialize(&record).unwrap();
        let result: Result<BalanceRecord> = deserialize(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(LedgerError::Serialization(_))));
    }
}
