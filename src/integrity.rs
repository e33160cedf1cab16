//! Content hashing and verification
//!
//! Snapshots are identified on disk by the SHA-256 of their stored bytes.
//! Verification streams the file through `io::copy`, so memory use does not
//! grow with snapshot size.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{SnapvaultError, SnapvaultResult};

/// Lowercase hex SHA-256 of a byte slice
pub fn hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Lowercase hex SHA-256 of a file, read in bounded chunks
pub fn hash_file(path: &Path) -> SnapvaultResult<String> {
    let file = File::open(path).map_err(|e| {
        SnapvaultError::Io(format!("Failed to open {}: {}", path.display(), e))
    })?;
    hash_reader(file)
        .map_err(|e| SnapvaultError::Io(format!("Failed to read {}: {}", path.display(), e)))
}

fn hash_reader(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check a file against an expected digest
///
/// A missing file does not verify. Other read failures are errors.
pub fn verify(path: &Path, expected: &str) -> SnapvaultResult<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let actual = hash_file(path)?;
    Ok(digests_match(&actual, expected))
}

/// Compare two digests without short-circuiting on the first difference
pub fn digests_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
