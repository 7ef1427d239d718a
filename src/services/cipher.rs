// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AES-256-GCM encryption for OAuth tokens at rest.
//!
//! Ciphertext format: base64(nonce || ciphertext), with the user ID as
//! associated data so a token cannot be moved to another user's record.

use crate::error::AppError;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    AeadCore, Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

const NONCE_LEN: usize = 12;

/// Token encryption service.
#[derive(Clone)]
pub struct TokenCipher {
    /// None in mock mode (plain base64, debug builds only)
    cipher: Option<Aes256Gcm>,
}

impl TokenCipher {
    /// Create a cipher from a 32-byte key.
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Some(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))),
        }
    }

    /// Create a mock cipher for testing (tokens are only base64-encoded).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self { cipher: None }
    }

    /// Build from optional configured key.
    pub fn from_key(key: Option<&[u8; 32]>) -> Result<Self, AppError> {
        match key {
            Some(key) => Ok(Self::new(key)),
            #[cfg(debug_assertions)]
            None => {
                tracing::warn!("TOKEN_ENCRYPTION_KEY not set, storing tokens base64-encoded");
                Ok(Self::new_mock())
            }
            #[cfg(not(debug_assertions))]
            None => Err(AppError::Internal(anyhow::anyhow!(
                "TOKEN_ENCRYPTION_KEY is required in release builds"
            ))),
        }
    }

    /// Encrypt a token for `user_id`. Returns base64 text.
    pub fn encrypt(&self, plaintext: &str, user_id: &str) -> Result<String, AppError> {
        let Some(cipher) = &self.cipher else {
            return Ok(BASE64.encode(plaintext));
        };

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: user_id.as_bytes(),
                },
            )
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token encrypt failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    /// Decrypt a token previously encrypted for `user_id`.
    pub fn decrypt(&self, encoded: &str, user_id: &str) -> Result<String, AppError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Base64 decode failed: {}", e)))?;

        let plaintext = match &self.cipher {
            None => bytes,
            Some(cipher) => {
                if bytes.len() <= NONCE_LEN {
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "Encrypted token too short"
                    )));
                }
                let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
                cipher
                    .decrypt(
                        Nonce::from_slice(nonce),
                        Payload {
                            msg: ciphertext,
                            aad: user_id.as_bytes(),
                        },
                    )
                    .map_err(|e| {
                        AppError::Internal(anyhow::anyhow!("Token decrypt failed: {}", e))
                    })?
            }
        };

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }
}
