//! AES-128-GCM filename encryption
//!
//! Encoded name format:
//! ```text
//! base64url_padded([12-byte nonce][ciphertext][16-byte tag]) + ".encrypted"
//! ```
//!
//! The URL-safe alphabet keeps the result legal as a single path component on
//! the remote drive. Encryption is randomized, so the same name sealed twice
//! gives two different stored names; lookups go through the metadata cache,
//! never through re-encryption.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Key, Nonce,
};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig};
use rand::RngCore;
use secrecy::SecretString;

use crate::kdf::{derive_key, NameKey};
use crate::{CryptoError, CryptoResult, NAME_MARKER, NONCE_SIZE};

/// URL-safe base64 that pads on encode and accepts either form on decode.
const NAME_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Whether `name` carries the encrypted-name marker.
pub fn is_encrypted_name(name: &str) -> bool {
    name.ends_with(NAME_MARKER)
}

/// `name` without the marker suffix, or `None` when it is not marked.
pub fn strip_marker(name: &str) -> Option<&str> {
    name.strip_suffix(NAME_MARKER)
}

/// Encrypt a filename under the 128-bit name key.
pub fn encrypt_name_with_key(key: &NameKey, name: &str) -> CryptoResult<String> {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, name.as_bytes())
        .map_err(|e| CryptoError::Encryption(format!("filename: {e}")))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    let mut encoded = NAME_ENGINE.encode(&blob);
    encoded.push_str(NAME_MARKER);
    Ok(encoded)
}

/// Decrypt a stored name produced by [`encrypt_name_with_key`].
///
/// Unmarked input is returned unchanged without touching the cipher. Marked
/// input that fails to decode, authenticate, or form valid UTF-8 is a
/// [`CryptoError::Decryption`].
pub fn decrypt_name_with_key(key: &NameKey, stored: &str) -> CryptoResult<String> {
    let Some(token) = strip_marker(stored) else {
        return Ok(stored.to_string());
    };

    let blob = NAME_ENGINE
        .decode(token)
        .map_err(|_| CryptoError::Decryption)?;
    if blob.len() < NONCE_SIZE {
        return Err(CryptoError::Decryption);
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key.as_bytes()));

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
}

/// Derive the key from `secret` and encrypt `name`.
pub fn encrypt_name(name: &str, secret: &SecretString) -> CryptoResult<String> {
    encrypt_name_with_key(&derive_key(secret).name_key(), name)
}

/// Derive the key from `secret` and decrypt `stored`.
///
/// Unmarked input short-circuits before the (slow) key derivation.
pub fn decrypt_name(stored: &str, secret: &SecretString) -> CryptoResult<String> {
    if !is_encrypted_name(stored) {
        return Ok(stored.to_string());
    }
    decrypt_name_with_key(&derive_key(secret).name_key(), stored)
}
