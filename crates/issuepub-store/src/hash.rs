//! Blake3 content hashing for provenance comments

/// Hash raw bytes with blake3.
pub fn content_hash(data: &[u8]) -> blake3::Hash {
    blake3::hash(data)
}

/// First `len` hex characters of a blake3 hash (at most 64).
pub fn short_hash(hash: &blake3::Hash, len: usize) -> String {
    let hex = hash.to_hex();
    hex[..len.min(hex.len())].to_string()
}
