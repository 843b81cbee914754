//! TSID Generator
//!
//! Time-sorted identifiers encoded as 13 character Crockford Base32
//! strings. Every entity and event id in Mosaic is a TSID, so ids sort by
//! creation time in both SQLite and MongoDB.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Crockford Base32 alphabet (no I, L, O, U)
const ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const ENCODED_LEN: usize = 13;

static COUNTER: AtomicU16 = AtomicU16::new(0);

pub struct TsidGenerator;

impl TsidGenerator {
    /// Generate a new TSID, e.g. "0HZXEQ5Y8JY5Z".
    ///
    /// Layout (64 bits):
    /// - 42 bits: milliseconds since the Unix epoch
    /// - 12 bits: counter (4096 ids per millisecond, keeps ids from one
    ///   process ordered within a millisecond)
    /// - 10 bits: random
    pub fn generate() -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let counter = COUNTER.fetch_add(1, Ordering::SeqCst) as u64;
        let random = rand::random::<u16>() as u64 & 0x3FF;

        let tsid = ((now & 0x3FF_FFFF_FFFF) << 22) | ((counter & 0xFFF) << 10) | random;
        encode_crockford(tsid)
    }

    /// Whether `tsid` has the shape of an id this generator produces.
    pub fn is_valid(tsid: &str) -> bool {
        decode_crockford(tsid).is_some()
    }
}

fn encode_crockford(mut value: u64) -> String {
    let mut out = [b'0'; ENCODED_LEN];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(value & 0x1F) as usize];
        value >>= 5;
    }
    out.iter().map(|b| *b as char).collect()
}

fn decode_crockford(s: &str) -> Option<u64> {
    if s.len() != ENCODED_LEN {
        return None;
    }
    s.bytes().try_fold(0u64, |acc, byte| {
        let digit = ALPHABET
            .iter()
            .position(|&symbol| symbol == byte.to_ascii_uppercase())?;
        Some((acc << 5) | digit as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_length() {
        let id = TsidGenerator::generate();
        assert_eq!(id.len(), 13);
        assert!(TsidGenerator::is_valid(&id));
    }

    #[test]
    fn test_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            assert!(ids.insert(TsidGenerator::generate()), "duplicate TSID");
        }
    }

    #[test]
    fn test_encoding_is_fixed_width() {
        assert_eq!(encode_crockford(0), "0000000000000");
        assert_eq!(decode_crockford(&encode_crockford(31)), Some(31));
    }

    #[test]
    fn test_sortability() {
        let first = TsidGenerator::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = TsidGenerator::generate();
        assert!(first < second);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!TsidGenerator::is_valid("short"));
        assert!(!TsidGenerator::is_valid("0HZXEQ5Y8JY5U"));
        assert!(TsidGenerator::is_valid("0hzxeq5y8jy5z"));
    }
}
