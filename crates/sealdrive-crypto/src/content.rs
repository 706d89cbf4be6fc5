//! AES-256-GCM content encryption
//!
//! Sealed payload format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use secrecy::SecretString;

use crate::kdf::{derive_key, DerivedKey};
use crate::{CryptoError, CryptoResult, NONCE_SIZE};

/// Seal `plaintext` under an already-derived key.
///
/// A fresh random nonce is drawn on every call, so sealing the same input
/// twice never yields the same bytes.
pub fn encrypt_with_key(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(format!("content: {e}")))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Open a payload produced by [`encrypt_with_key`].
///
/// Input shorter than a nonce and tag-verification failure both yield
/// [`CryptoError::Decryption`].
pub fn decrypt_with_key(key: &DerivedKey, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < NONCE_SIZE {
        return Err(CryptoError::Decryption);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

/// Derive the key from `secret` and seal `plaintext`.
pub fn encrypt_content(plaintext: &[u8], secret: &SecretString) -> CryptoResult<Vec<u8>> {
    encrypt_with_key(&derive_key(secret), plaintext)
}

/// Derive the key from `secret` and open `sealed`.
pub fn decrypt_content(sealed: &[u8], secret: &SecretString) -> CryptoResult<Vec<u8>> {
    decrypt_with_key(&derive_key(secret), sealed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KEY_SIZE, TAG_SIZE};

    fn test_key() -> DerivedKey {
        DerivedKey::from_bytes([0x33u8; KEY_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"hello, encrypted world!";

        let sealed = encrypt_with_key(&key, plaintext).unwrap();
        let opened = decrypt_with_key(&key, &sealed).unwrap();

        assert_eq!(&opened, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = test_key();

        let sealed = encrypt_with_key(&key, b"").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + TAG_SIZE);
        assert_eq!(decrypt_with_key(&key, &sealed).unwrap(), b"");
    }

    #[test]
    fn test_sealed_size() {
        let sealed = encrypt_with_key(&test_key(), &[0u8; 1000]).unwrap();

        // nonce (12) + plaintext (1000) + tag (16) = 1028
        assert_eq!(sealed.len(), 12 + 1000 + 16);
    }

    #[test]
    fn test_nonce_is_fresh() {
        let key = test_key();
        let a = encrypt_with_key(&key, b"same input").unwrap();
        let b = encrypt_with_key(&key, b"same input").unwrap();

        assert_ne!(a, b);
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let sealed = encrypt_with_key(&test_key(), b"secret data").unwrap();
        let other = DerivedKey::from_bytes([0x44u8; KEY_SIZE]);

        assert!(matches!(
            decrypt_with_key(&other, &sealed),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_decrypt_too_short() {
        for len in [0, 1, NONCE_SIZE - 1] {
            let result = decrypt_with_key(&test_key(), &vec![0u8; len]);
            assert!(matches!(result, Err(CryptoError::Decryption)), "len {len}");
        }
    }

    #[test]
    fn test_short_and_tampered_share_message() {
        let key = test_key();
        let mut sealed = encrypt_with_key(&key, b"secret data").unwrap();
        sealed[NONCE_SIZE + 1] ^= 0xFF;

        let tampered = decrypt_with_key(&key, &sealed).unwrap_err().to_string();
        let short = decrypt_with_key(&key, b"abc").unwrap_err().to_string();

        assert_eq!(tampered, short);
    }

    #[test]
    fn test_secret_level_roundtrip_and_wrong_secret() {
        let right = SecretString::from("right-secret");
        let wrong = SecretString::from("wrong-secret");

        let sealed = encrypt_content(b"quarterly numbers", &right).unwrap();
        assert_eq!(decrypt_content(&sealed, &right).unwrap(), b"quarterly numbers");
        assert!(matches!(
            decrypt_content(&sealed, &wrong),
            Err(CryptoError::Decryption)
        ));
    }

    mod proptest_suite {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn roundtrip_any_key_any_bytes(
                key in any::<[u8; KEY_SIZE]>(),
                data in proptest::collection::vec(any::<u8>(), 0..4096),
            ) {
                let key = DerivedKey::from_bytes(key);
                let sealed = encrypt_with_key(&key, &data).unwrap();
                prop_assert_eq!(sealed.len(), NONCE_SIZE + data.len() + TAG_SIZE);
                prop_assert_eq!(decrypt_with_key(&key, &sealed).unwrap(), data);
            }

            #[test]
            fn any_bit_flip_is_rejected(
                data in proptest::collection::vec(any::<u8>(), 1..256),
                idx in any::<prop::sample::Index>(),
            ) {
                let key = test_key();
                let mut sealed = encrypt_with_key(&key, &data).unwrap();
                let i = idx.index(sealed.len());
                sealed[i] ^= 0x01;
                prop_assert!(decrypt_with_key(&key, &sealed).is_err());
            }
        }
    }
}
