//! Cryptographic functions for snapvault
//!
//! Provides AES-256-GCM authenticated encryption of snapshot archives and
//! the per-directory key file that backs it.

pub mod encryption;
pub mod key_store;

pub use encryption::{decrypt, encrypt};
pub use key_store::{EncryptionKey, KeyStore, KEY_SIZE};
