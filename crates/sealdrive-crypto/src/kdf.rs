//! Key derivation: PBKDF2-HMAC-SHA256 secret → content key

use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{KEY_SIZE, NAME_KEY_SIZE};

/// Salt shared by every installation.
///
/// Equal secrets yield equal keys across users. Objects already stored remotely
/// were sealed under this salt, so changing it would orphan them.
pub const KDF_SALT: &[u8] = b"secure-cloud-salt-2024";

/// Default (and minimum accepted) PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// A 256-bit content key derived from the user's secret.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// The filename key: the first 16 bytes of the content key.
    pub fn name_key(&self) -> NameKey {
        let mut bytes = [0u8; NAME_KEY_SIZE];
        bytes.copy_from_slice(&self.bytes[..NAME_KEY_SIZE]);
        NameKey { bytes }
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 128-bit filename key. Zeroized on drop.
#[derive(Clone)]
pub struct NameKey {
    bytes: [u8; NAME_KEY_SIZE],
}

impl NameKey {
    pub fn from_bytes(bytes: [u8; NAME_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; NAME_KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for NameKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for NameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// Iteration count (default: 100000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Derive the content key from `secret` with the default parameters.
pub fn derive_key(secret: &SecretString) -> DerivedKey {
    derive_key_with(secret, &KdfParams::default())
}

/// Derive the content key from `secret`.
///
/// Deterministic: the same secret and parameters always produce the same key.
pub fn derive_key_with(secret: &SecretString, params: &KdfParams) -> DerivedKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        secret.expose_secret().as_bytes(),
        KDF_SALT,
        params.iterations,
        &mut key,
    );
    DerivedKey::from_bytes(key)
}
