//! Content hashing for cached tool files using BLAKE3

use std::path::Path;

/// Compute content hash for file bytes, hex encoded.
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(content);
    hex::encode(hasher.finalize().as_bytes())
}

/// Hash the current on-disk content of `path`.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(compute_content_hash(&content))
}
