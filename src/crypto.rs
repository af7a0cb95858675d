use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::models::EncryptedPayload;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encrypt(String),
    /// Authentication tag mismatch. Wrong password or tampered data.
    #[error("Decryption failed: authentication tag mismatch")]
    Authentication,
    #[error("Invalid {field} length: {actual} (expected {expected})")]
    InvalidLength {
        field: &'static str,
        actual: usize,
        expected: usize,
    },
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stretch a password into a 256-bit AES key with PBKDF2-HMAC-SHA256.
pub fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut *key);
    key
}

/// Encrypt the JSON form of `data` under a key derived from `password`.
/// Salt and IV are freshly generated for every call.
pub fn encrypt<T: Serialize + ?Sized>(data: &T, password: &str) -> Result<EncryptedPayload, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let plaintext = Zeroizing::new(serde_json::to_vec(data)?);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    Ok(EncryptedPayload {
        encrypted_data: B64.encode(ciphertext),
        salt: B64.encode(salt),
        iv: B64.encode(iv),
        is_encrypted_wrapper: true,
    })
}

/// Decrypt base64 ciphertext back into a JSON value of type `T`.
pub fn decrypt<T: DeserializeOwned>(
    encrypted_data: &str,
    password: &str,
    salt: &str,
    iv: &str,
) -> Result<T, CryptoError> {
    let salt = B64.decode(salt)?;
    let iv = B64.decode(iv)?;
    let ciphertext = B64.decode(encrypted_data)?;

    if salt.len() != SALT_LEN {
        return Err(CryptoError::InvalidLength {
            field: "salt",
            actual: salt.len(),
            expected: SALT_LEN,
        });
    }
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidLength {
            field: "iv",
            actual: iv.len(),
            expected: IV_LEN,
        });
    }

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Authentication)?;

    Ok(serde_json::from_slice(&plaintext)?)
}

pub fn decrypt_payload<T: DeserializeOwned>(payload: &EncryptedPayload, password: &str) -> Result<T, CryptoError> {
    decrypt(&payload.encrypted_data, password, &payload.salt, &payload.iv)
}

/// SHA-256 digest of the password, as recorded on-chain
pub fn password_hash(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

/// `0x`-prefixed lowercase hex, the form chain calls take
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Content hash of a JSON document, used when anchoring notes
pub fn content_hash(document: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(document).unwrap_or_default();
    to_hex(&Sha256::digest(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let doc = json!({
            "type": "doc",
            "content": [{ "type": "paragraph", "content": [{ "type": "text", "text": "gm résumé 🔑" }] }]
        });
        let payload = encrypt(&doc, "hunter22").unwrap();
        let decrypted: serde_json::Value =
            decrypt(&payload.encrypted_data, "hunter22", &payload.salt, &payload.iv).unwrap();
        assert_eq!(decrypted, doc);
    }

    #[test]
    fn test_wrong_password_fails_authentication() {
        let payload = encrypt(&json!({"secret": 42}), "correct horse").unwrap();
        let result = decrypt_payload::<serde_json::Value>(&payload, "battery staple");
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_fresh_salt_and_iv_per_call() {
        let doc = json!("same input");
        let a = encrypt(&doc, "pw").unwrap();
        let b = encrypt(&doc, "pw").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encrypted_data, b.encrypted_data);
        assert_eq!(B64.decode(&a.salt).unwrap().len(), SALT_LEN);
        assert_eq!(B64.decode(&a.iv).unwrap().len(), IV_LEN);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let payload = encrypt(&json!([1, 2, 3]), "pw").unwrap();
        let mut bytes = B64.decode(&payload.encrypted_data).unwrap();
        if let Some(b) = bytes.first_mut() {
            *b ^= 0xFF;
        }
        let result = decrypt::<serde_json::Value>(&B64.encode(&bytes), "pw", &payload.salt, &payload.iv);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_bad_iv_length_is_rejected() {
        let payload = encrypt(&json!(null), "pw").unwrap();
        let short_iv = B64.encode([0u8; 8]);
        let result = decrypt::<serde_json::Value>(&payload.encrypted_data, "pw", &payload.salt, &short_iv);
        assert!(matches!(result, Err(CryptoError::InvalidLength { field: "iv", .. })));
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        assert_eq!(*derive_key("pw", &salt), *derive_key("pw", &salt));
        assert_ne!(*derive_key("pw", &salt), *derive_key("pw", &[8u8; SALT_LEN]));
    }

    #[test]
    fn test_password_hash_hex() {
        // sha256("abc")
        assert_eq!(
            to_hex(&password_hash("abc")),
            "0xba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
