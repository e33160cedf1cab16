//! AES-256-GCM encryption/decryption
//!
//! Provides authenticated encryption for snapshot archives. Each encryption
//! operation generates a unique nonce. The on-disk envelope is:
//!
//! ```text
//! version (1 byte) || nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! The version byte is bound as associated data, so the tag covers every
//! byte of the envelope.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};

use crate::error::{SnapvaultError, SnapvaultResult};

use super::EncryptionKey;

/// Current envelope format version
pub const ENVELOPE_VERSION: u8 = 1;

/// Size of the AES-GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes
const TAG_SIZE: usize = 16;

const HEADER_SIZE: usize = 1 + NONCE_SIZE;

/// Smallest possible envelope (empty plaintext)
pub const MIN_ENVELOPE_SIZE: usize = HEADER_SIZE + TAG_SIZE;

fn cipher_for(key: &EncryptionKey) -> SnapvaultResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SnapvaultError::KeyAccess(format!("Failed to create cipher: {}", e)))
}

/// Encrypt plaintext data using AES-256-GCM
///
/// Generates a random nonce for each encryption operation.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> SnapvaultResult<Vec<u8>> {
    let cipher = cipher_for(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let header = [ENVELOPE_VERSION];
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &header,
            },
        )
        .map_err(|e| SnapvaultError::Encryption(format!("Encryption failed: {}", e)))?;

    let mut envelope = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    envelope.extend_from_slice(&header);
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Decrypt an envelope produced by [`encrypt`]
///
/// The tag is verified before any plaintext is returned. Every failure,
/// including a malformed header, is reported as an authentication error.
pub fn decrypt(envelope: &[u8], key: &EncryptionKey) -> SnapvaultResult<Vec<u8>> {
    if envelope.len() < MIN_ENVELOPE_SIZE {
        return Err(SnapvaultError::Authentication(format!(
            "Envelope too short: {} bytes",
            envelope.len()
        )));
    }

    if envelope[0] != ENVELOPE_VERSION {
        return Err(SnapvaultError::Authentication(format!(
            "Unsupported envelope version: {}",
            envelope[0]
        )));
    }

    let cipher = cipher_for(key)?;
    let (header, rest) = envelope.split_at(1);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| {
            SnapvaultError::Authentication("invalid key or corrupted data".to_string())
        })
}
