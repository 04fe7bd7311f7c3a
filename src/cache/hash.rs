//! Content fingerprints for cached entries.

use sha2::{Digest, Sha256};

/// SHA256 of a cached entry's bytes as a 64-character lowercase hex string.
///
/// Every adapter stores the same bytes for the same record, so equal
/// fingerprints across media mean the cached content is identical.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
