// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-GCM payload encryption.
//!
//! Payloads are laid out as `nonce (12 bytes) || ciphertext || tag`, with a
//! fresh random nonce per call. Secrets travel as standard padded base64.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64ct::{Base64, Encoding};

use crate::error::{StoreError, StoreResult};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Generate a random base64-encoded key.
pub fn generate_secret() -> String {
    let key = Aes256Gcm::generate_key(&mut OsRng);
    Base64::encode_string(key.as_slice())
}

/// Decode a base64 secret and check its length.
pub fn decode_secret(secret: &str) -> StoreResult<Vec<u8>> {
    let bytes = Base64::decode_vec(secret)
        .map_err(|e| StoreError::Encryption(format!("invalid base64 secret: {e}")))?;
    if bytes.len() != KEY_SIZE {
        return Err(StoreError::Encryption(format!(
            "invalid key size: expected {KEY_SIZE}, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Encrypt `plaintext` with a base64 secret.
pub fn encrypt(plaintext: &[u8], secret: &str) -> StoreResult<Vec<u8>> {
    let key_bytes = decode_secret(secret)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| StoreError::Encryption(format!("payload encryption failed: {e}")))?;

    let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    payload.extend_from_slice(nonce.as_slice());
    payload.extend_from_slice(&ciphertext);
    Ok(payload)
}

/// Decrypt a `nonce || ciphertext` payload with a base64 secret.
pub fn decrypt(payload: &[u8], secret: &str) -> StoreResult<Vec<u8>> {
    if payload.len() < NONCE_SIZE {
        return Err(StoreError::Decryption(format!(
            "payload too short: {} bytes",
            payload.len()
        )));
    }
    let key_bytes = decode_secret(secret).map_err(|e| StoreError::Decryption(e.to_string()))?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let (nonce, ciphertext) = payload.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| StoreError::Decryption(format!("payload decryption failed: {e}")))
}
