// crates/assemblit-store/src/hashing.rs
// ============================================================================
// Module: Hashing
// Description: SHA-256 digests and identifier generation.
// Purpose: Deterministic table names and unique record identifiers.
// Dependencies: sha2, time
// ============================================================================

//! ## Overview
//! Dataset tables are named by a digest of their scope and file name so the
//! same upload always maps to the same table. Record identifiers mix the
//! caller's seed with the current time so repeated seeds still differ.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hex characters kept for generated identifiers.
const IDENTIFIER_HEX_LENGTH: usize = 32;

/// Process-wide counter mixed into generated identifiers.
static IDENTIFIER_COUNTER: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Returns the lowercase hex SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Returns the table name for a dataset uploaded under `scope_id`.
///
/// The digest covers the lower-cased concatenation, so re-uploading the same
/// file name in the same scope yields the same name.
#[must_use]
pub fn dataset_table_name(scope_id: &str, file_name: &str) -> String {
    let seed = format!("{scope_id}{file_name}").to_lowercase();
    sha256_hex(seed.as_bytes())
}

/// Generates a 32-character hex identifier from `seed` and the current time.
#[must_use]
pub fn generate_id(seed: &str) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let counter = IDENTIFIER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut digest = sha256_hex(format!("{now}{counter}{seed}").as_bytes());
    digest.truncate(IDENTIFIER_HEX_LENGTH);
    digest
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_table_name_ignores_case() {
        assert_eq!(
            dataset_table_name("Session1", "Sales.CSV"),
            dataset_table_name("session1", "sales.csv")
        );
        assert_ne!(
            dataset_table_name("session1", "a.csv"),
            dataset_table_name("session2", "a.csv")
        );
        assert_eq!(dataset_table_name("s", "f").len(), 64);
    }

    #[test]
    fn sha256_hex_matches_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn generated_ids_are_hex_and_distinct() {
        let first = generate_id("alice@example.com");
        let second = generate_id("alice@example.com");
        assert_eq!(first.len(), IDENTIFIER_HEX_LENGTH);
        assert!(first.chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
