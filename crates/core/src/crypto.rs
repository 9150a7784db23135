//! AES-256-GCM encryption for platform credentials at rest.

use std::path::Path;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, SatchelError};

const NONCE_LEN: usize = 12;

/// Generate a new random 256-bit encryption key.
pub fn generate_key() -> [u8; 32] {
    use rand::RngCore;
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Encrypt plaintext, returning nonce (12 bytes) || ciphertext.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| SatchelError::Crypto(format!("encryption failed: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt the output of [`encrypt`].
pub fn decrypt(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(SatchelError::Crypto(
            "ciphertext too short: missing nonce".into(),
        ));
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| SatchelError::Crypto(format!("decryption failed: {e}")))
}

/// Serialize `value` to JSON and encrypt it.
pub fn seal_json<T: Serialize>(key: &[u8; 32], value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)
        .map_err(|e| SatchelError::Serialization(e.to_string()))?;
    encrypt(key, &json)
}

/// Decrypt and deserialize a value written by [`seal_json`].
pub fn open_json<T: DeserializeOwned>(key: &[u8; 32], sealed: &[u8]) -> Result<T> {
    let json = decrypt(key, sealed)?;
    serde_json::from_slice(&json).map_err(|e| SatchelError::Serialization(e.to_string()))
}

/// Write a freshly generated key to `path` as base64 text.
pub fn write_key_file(path: &Path) -> Result<[u8; 32]> {
    let key = generate_key();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, STANDARD.encode(key))?;
    Ok(key)
}

/// Read a key written by [`write_key_file`].
pub fn load_key_file(path: &Path) -> Result<[u8; 32]> {
    let text = std::fs::read_to_string(path)?;
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| SatchelError::Crypto(format!("key file is not valid base64: {e}")))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        SatchelError::Crypto(format!("key must be 32 bytes, found {}", b.len()))
    })
}
