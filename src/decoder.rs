//! Decoding of raw `Transfer` logs into [`Transfer`] records.
//!
//! Decoding is pure: the only ambient input is the wall clock used for
//! `observed_at`, and [`decode_at`] takes that explicitly.
//!
//! Layout of an ERC-20 `Transfer` log:
//!
//! ```text
//! topics[0] = keccak256("Transfer(address,address,uint256)")
//! topics[1] = sender, left-padded to 32 bytes
//! topics[2] = recipient, left-padded to 32 bytes
//! data      = uint256 amount, big-endian
//! ```

use alloy::primitives::{hex, Address, B256, U256};
use chrono::{DateTime, Utc};

use crate::error::{IndexerError, IndexerResult};
use crate::events::{LogPayload, RawLogEntry, Transfer};

/// Decode a raw log, stamping it with the current UTC time.
///
/// # Errors
///
/// Returns [`IndexerError::DecodeError`] if the entry has fewer than three
/// topics, lacks a transaction hash or block number, or carries a payload
/// that is not an unsigned 256-bit integer.
pub fn decode(entry: &RawLogEntry) -> IndexerResult<Transfer> {
    decode_at(entry, Utc::now())
}

/// Decode a raw log with an explicit `observed_at` timestamp.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_at(entry: &RawLogEntry, observed_at: DateTime<Utc>) -> IndexerResult<Transfer> {
    if entry.topics.len() < 3 {
        return Err(IndexerError::decode(
            format!(
                "Transfer log needs at least 3 topics, found {}",
                entry.topics.len()
            ),
            None,
        ));
    }

    let tx_hash = entry
        .tx_hash
        .ok_or_else(|| IndexerError::decode("Log missing transaction hash", None))?;

    let block_number = entry
        .block_number
        .ok_or_else(|| IndexerError::decode("Log missing block number", None))?;

    Ok(Transfer {
        tx_hash: hex::encode_prefixed(tx_hash),
        from_address: topic_to_address(&entry.topics[1]),
        to_address: topic_to_address(&entry.topics[2]),
        value: decode_amount(&entry.data)?,
        block_number,
        observed_at,
    })
}

/// Render the low 20 bytes of an indexed topic as a `0x`-prefixed address.
#[must_use]
pub fn topic_to_address(topic: &B256) -> String {
    hex::encode_prefixed(Address::from_word(*topic))
}

/// Interpret a log payload as an unsigned 256-bit amount.
///
/// Bytes are read big-endian; hex strings are parsed base 16. An empty
/// payload or one wider than 256 bits is rejected rather than truncated.
///
/// # Errors
///
/// Returns [`IndexerError::DecodeError`] for empty, oversized or non-hex payloads.
pub fn decode_amount(payload: &LogPayload) -> IndexerResult<U256> {
    match payload {
        LogPayload::Bytes(bytes) => {
            if bytes.is_empty() {
                return Err(IndexerError::decode("Transfer log has empty data", None));
            }
            U256::try_from_be_slice(bytes).ok_or_else(|| {
                IndexerError::decode(
                    format!("Transfer amount is {} bytes, wider than uint256", bytes.len()),
                    None,
                )
            })
        }
        LogPayload::Hex(text) => {
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .unwrap_or(text);
            if digits.is_empty() {
                return Err(IndexerError::decode("Transfer log has empty data", None));
            }
            U256::from_str_radix(digits, 16).map_err(|e| {
                IndexerError::decode(
                    format!("Transfer amount is not a uint256 hex string: {text}"),
                    Some(Box::new(e)),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::events::TRANSFER_TOPIC;
    use alloy::primitives::{b256, Bytes};

    const SENDER: B256 =
        b256!("000000000000000000000000b518b3136e491101f22b77f385fe22269c515188");
    const RECIPIENT: B256 =
        b256!("0000000000000000000000007dfd6013cf8d92b751e63d481b51fe0e4c5abf5e");
    const TX: B256 = b256!("0000000000000000000000000000000000000000000000000000000000000abc");

    fn entry(data: LogPayload) -> RawLogEntry {
        RawLogEntry {
            tx_hash: Some(TX),
            block_number: Some(100),
            topics: vec![TRANSFER_TOPIC, SENDER, RECIPIENT],
            data,
        }
    }

    fn word(value: u64) -> Bytes {
        Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec())
    }

    #[test]
    fn test_decode_transfer_fields() {
        let observed_at = Utc::now();
        let transfer = decode_at(&entry(LogPayload::Bytes(word(100))), observed_at).unwrap();

        assert_eq!(transfer.from_address, "0xb518b3136e491101f22b77f385fe22269c515188");
        assert_eq!(transfer.to_address, "0x7dfd6013cf8d92b751e63d481b51fe0e4c5abf5e");
        assert_eq!(transfer.value, U256::from(100));
        assert_eq!(transfer.block_number, 100);
        assert_eq!(transfer.observed_at, observed_at);
        assert_eq!(transfer.tx_hash, hex::encode_prefixed(TX));
    }

    #[test]
    fn test_bytes_and_hex_payloads_agree() {
        let hex_payload =
            LogPayload::Hex(format!("0x{:064x}", 100u64));
        let from_hex = decode_amount(&hex_payload).unwrap();
        let from_bytes = decode_amount(&LogPayload::Bytes(word(100))).unwrap();

        assert_eq!(from_hex, from_bytes);
        assert_eq!(from_hex, U256::from(100));
    }

    #[test]
    fn test_amount_wider_than_u128() {
        let big = U256::from(u128::MAX) * U256::from(1_000u64) + U256::from(7u64);
        let bytes = Bytes::from(big.to_be_bytes::<32>().to_vec());

        let amount = decode_amount(&LogPayload::Bytes(bytes)).unwrap();
        assert_eq!(amount, big);
        assert_eq!(amount.to_string(), "340282366920938463463374607431768211455007");
    }

    #[test]
    fn test_short_byte_payload_is_big_endian() {
        let amount = decode_amount(&LogPayload::Bytes(Bytes::from(vec![0x01, 0x00]))).unwrap();
        assert_eq!(amount, U256::from(256));
    }

    #[test]
    fn test_hex_without_prefix() {
        let amount = decode_amount(&LogPayload::Hex("ff".to_string())).unwrap();
        assert_eq!(amount, U256::from(255));
    }

    #[test]
    fn test_missing_topics_is_decode_error() {
        let mut short = entry(LogPayload::Bytes(word(1)));
        short.topics.truncate(2);

        let err = decode(&short).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_malformed_payloads_are_decode_errors() {
        for payload in [
            LogPayload::Bytes(Bytes::new()),
            LogPayload::Bytes(Bytes::from(vec![0xff; 33])),
            LogPayload::Hex("0x".to_string()),
            LogPayload::Hex("0xzz".to_string()),
        ] {
            let err = decode(&entry(payload)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decode);
        }
    }

    #[test]
    fn test_pending_log_is_decode_error() {
        let mut pending = entry(LogPayload::Bytes(word(1)));
        pending.tx_hash = None;
        assert!(decode(&pending).is_err());

        let mut pending = entry(LogPayload::Bytes(word(1)));
        pending.block_number = None;
        assert!(decode(&pending).is_err());
    }
}
