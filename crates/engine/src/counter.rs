//! Counter key encoding
//!
//! Counters persist as zigzag varints under a reserved key family. The
//! prefix starts with a 0 byte so counter keys can never collide with
//! UTF-8 application keys.

/// Reserved key-family prefix for named counters.
pub const COUNTER_PREFIX: &[u8] = b"\x00counter\x00";

/// Backend key for the named counter.
pub fn counter_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(COUNTER_PREFIX.len() + name.len());
    key.extend_from_slice(COUNTER_PREFIX);
    key.extend_from_slice(name.as_bytes());
    key
}

/// Encode a signed 64-bit integer as a zigzag varint.
pub fn encode_varint(value: i64) -> Vec<u8> {
    // Zigzag: small magnitudes of either sign stay short
    let mut remaining = ((value << 1) ^ (value >> 63)) as u64;
    let mut out = Vec::with_capacity(10);
    loop {
        let byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

/// Decode a zigzag varint. Returns `None` for truncated, overlong, or
/// overflowing input.
pub fn decode_varint(bytes: &[u8]) -> Option<i64> {
    let mut acc: u64 = 0;
    let mut shift = 0u32;
    for &byte in bytes {
        if shift >= 64 {
            return None;
        }
        let chunk = (byte & 0x7f) as u64;
        // The tenth byte can only carry one bit
        if shift == 63 && chunk > 1 {
            return None;
        }
        acc |= chunk << shift;
        if byte & 0x80 == 0 {
            return Some(((acc >> 1) as i64) ^ -((acc & 1) as i64));
        }
        shift += 7;
    }
    // Ran out of bytes with the continuation bit still set
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_trip_known_values() {
        for v in [0i64, 1, -1, 2, -2, 63, 64, -64, -65, 1000, -1000, i64::MAX, i64::MIN] {
            assert_eq!(decode_varint(&encode_varint(v)), Some(v), "value {v}");
        }
    }

    #[test]
    fn test_small_magnitudes_encode_short() {
        assert_eq!(encode_varint(0), vec![0]);
        assert_eq!(encode_varint(-1), vec![1]);
        assert_eq!(encode_varint(1), vec![2]);
        assert_eq!(encode_varint(63).len(), 1);
        assert_eq!(encode_varint(64).len(), 2);
    }

    #[test]
    fn test_decode_empty_is_none() {
        assert_eq!(decode_varint(&[]), None);
    }

    #[test]
    fn test_decode_truncated_is_none() {
        let mut bytes = encode_varint(1_000_000);
        bytes.pop();
        assert_eq!(decode_varint(&bytes), None);
    }

    #[test]
    fn test_decode_overflowing_is_none() {
        // Eleven continuation bytes exceed any u64
        assert_eq!(decode_varint(&[0x80; 11]), None);
        assert_eq!(
            decode_varint(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f]),
            None
        );
    }

    #[test]
    fn test_counter_key_reserved_prefix() {
        let key = counter_key("hits");
        assert!(key.starts_with(COUNTER_PREFIX));
        assert_eq!(key[0], 0);
        assert!(key.ends_with(b"hits"));
        assert_ne!(counter_key("a"), counter_key("b"));
    }

    proptest! {
        #[test]
        fn prop_varint_round_trip(v in any::<i64>()) {
            prop_assert_eq!(decode_varint(&encode_varint(v)), Some(v));
        }

        #[test]
        fn prop_encoding_length_bounded(v in any::<i64>()) {
            prop_assert!(encode_varint(v).len() <= 10);
        }
    }
}
