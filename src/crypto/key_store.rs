//! Encryption key lifecycle
//!
//! One 256-bit key per backup directory, generated on first use and
//! persisted base64-encoded with owner-only permissions. Every snapshot
//! written to the directory is encrypted under that key, so losing the key
//! file makes those snapshots unrecoverable.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{SnapvaultError, SnapvaultResult};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// A symmetric key, zeroed when dropped
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generate a fresh random key from the OS RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Build a key from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.bytes))
    }

    fn decode(encoded: &str) -> SnapvaultResult<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| SnapvaultError::KeyAccess(format!("Invalid key encoding: {}", e)))?,
        );

        if decoded.len() != KEY_SIZE {
            return Err(SnapvaultError::KeyAccess(format!(
                "Invalid key length: expected {} bytes, got {}",
                KEY_SIZE,
                decoded.len()
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }
}

// Don't print the key in Debug output
impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Owns the key file of one backup directory
#[derive(Debug, Clone)]
pub struct KeyStore {
    key_path: PathBuf,
}

impl KeyStore {
    /// Create a KeyStore for the given key file path
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }

    /// Get the key file path
    pub fn path(&self) -> &Path {
        &self.key_path
    }

    /// Check whether a key has been persisted
    pub fn exists(&self) -> bool {
        self.key_path.exists()
    }

    /// Load the existing key, or generate and persist one on first use
    ///
    /// Creation is create-if-absent: the key is written to a private temp
    /// file and hard-linked into place, which fails if another process
    /// published a key first. In that case the winner's key is loaded.
    pub fn load_or_create(&self) -> SnapvaultResult<EncryptionKey> {
        if self.key_path.exists() {
            return self.load();
        }

        let key = EncryptionKey::generate();
        match self.publish(&key) {
            Ok(()) => {
                info!(path = %self.key_path.display(), "Generated new encryption key");
                Ok(key)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Key file appeared concurrently, loading it");
                self.load()
            }
            Err(e) => Err(SnapvaultError::KeyAccess(format!(
                "Failed to write key file {}: {}",
                self.key_path.display(),
                e
            ))),
        }
    }

    /// Load an existing key without ever creating one
    pub fn load(&self) -> SnapvaultResult<EncryptionKey> {
        let contents = Zeroizing::new(fs::read_to_string(&self.key_path).map_err(|e| {
            SnapvaultError::KeyAccess(format!(
                "Failed to read key file {}: {}",
                self.key_path.display(),
                e
            ))
        })?);

        EncryptionKey::decode(&contents)
    }

    fn publish(&self, key: &EncryptionKey) -> io::Result<()> {
        let dir = self
            .key_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let temp_path = dir.join(format!(".encryption_key.{}.tmp", Uuid::new_v4()));
        let result = write_private(&temp_path, key.encode().as_bytes())
            .and_then(|()| fs::hard_link(&temp_path, &self.key_path));

        let _ = fs::remove_file(&temp_path);
        result
    }
}

fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = create_private(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(unix)]
fn create_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}
