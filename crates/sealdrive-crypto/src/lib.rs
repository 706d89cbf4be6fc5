//! sealdrive-crypto: client-side encryption for sealdrive
//!
//! Everything that leaves the client is sealed with AES-GCM under a key
//! derived from the user's secret:
//! ```text
//! secret ──PBKDF2-HMAC-SHA256──▶ 256-bit content key
//!                                  └── first 16 bytes: name key
//!
//! content:  AES-256-GCM   [12-byte nonce][ciphertext][16-byte tag]
//! names:    AES-128-GCM   base64url([12-byte nonce][ciphertext][16-byte tag]) + ".encrypted"
//! ```
//!
//! Every decryption failure maps to the same [`CryptoError::Decryption`] so
//! callers cannot distinguish a wrong secret from truncated or tampered data.

pub mod content;
pub mod kdf;
pub mod names;

pub use content::{decrypt_content, decrypt_with_key, encrypt_content, encrypt_with_key};
pub use kdf::{derive_key, derive_key_with, DerivedKey, KdfParams, NameKey};
pub use names::{
    decrypt_name, decrypt_name_with_key, encrypt_name, encrypt_name_with_key, is_encrypted_name,
    strip_marker,
};

use sealdrive_core::error::DECRYPTION_FAILED;
use sealdrive_core::SealError;

/// Size of the content key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the filename key in bytes (128-bit prefix of the content key)
pub const NAME_KEY_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Literal suffix carried by every encrypted stored name
pub const NAME_MARKER: &str = ".encrypted";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("{}", DECRYPTION_FAILED)]
    Decryption,

    #[error("encryption failed: {0}")]
    Encryption(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for SealError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Decryption => SealError::Decryption,
            CryptoError::Encryption(msg) => SealError::Encryption(msg),
        }
    }
}
