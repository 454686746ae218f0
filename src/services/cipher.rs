// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! At-rest encryption for persisted vehicle tokens.
//!
//! Tokens are sealed with AES-256-GCM under a key derived (HKDF-SHA256)
//! from the configured storage key. The caller supplies associated data,
//! so a token file copied to another account's slot fails to decrypt.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use std::sync::Arc;

const HKDF_SALT: &[u8] = b"zeekr-bridge-token-store";
const HKDF_INFO: &[u8] = b"token-encryption-v1";

/// Token encryption service.
#[derive(Clone)]
pub struct TokenCipher {
    /// `None` means tokens are only base64-encoded.
    key: Option<Arc<LessSafeKey>>,
    rng: SystemRandom,
}

impl TokenCipher {
    /// Derive an AES-256-GCM key from the configured key material.
    pub fn new(key_material: &str) -> Result<Self, AppError> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), key_material.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Key derivation failed: {}", e)))?;

        let unbound = UnboundKey::new(&AES_256_GCM, &okm)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid AES-256-GCM key")))?;

        Ok(Self {
            key: Some(Arc::new(LessSafeKey::new(unbound))),
            rng: SystemRandom::new(),
        })
    }

    /// Cipher that stores tokens base64-encoded without encryption.
    pub fn plaintext() -> Self {
        Self {
            key: None,
            rng: SystemRandom::new(),
        }
    }

    /// Build from optional configuration, falling back to plaintext.
    pub fn from_config(key_material: Option<&str>) -> Result<Self, AppError> {
        match key_material {
            Some(key) if !key.is_empty() => Self::new(key),
            _ => {
                tracing::warn!(
                    "TOKEN_STORAGE_KEY not set, persisted tokens are stored unencrypted"
                );
                Ok(Self::plaintext())
            }
        }
    }

    pub fn is_encrypting(&self) -> bool {
        self.key.is_some()
    }

    /// Encrypt plaintext bound to `aad`.
    /// Returns base64 of `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &str, aad: &[u8]) -> Result<String, AppError> {
        let Some(key) = &self.key else {
            return Ok(BASE64.encode(plaintext));
        };

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Random nonce generation failed")))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::from(aad),
            &mut in_out,
        )
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Token encryption failed")))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&in_out);
        Ok(BASE64.encode(sealed))
    }

    /// Decrypt a value produced by [`TokenCipher::encrypt`] with the same `aad`.
    pub fn decrypt(&self, ciphertext_b64: &str, aad: &[u8]) -> Result<String, AppError> {
        let bytes = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| AppError::Storage(format!("Base64 decode failed: {}", e)))?;

        let Some(key) = &self.key else {
            return String::from_utf8(bytes)
                .map_err(|e| AppError::Storage(format!("UTF-8 decode failed: {}", e)));
        };

        if bytes.len() < NONCE_LEN {
            return Err(AppError::Storage("Ciphertext too short".to_string()));
        }
        let (nonce_bytes, sealed) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AppError::Storage("Invalid nonce".to_string()))?;

        let mut in_out = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::from(aad), &mut in_out)
            .map_err(|_| AppError::Storage("Token decryption failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| AppError::Storage(format!("UTF-8 decode failed: {}", e)))
    }
}

/// Encrypt an access/refresh pair before storing.
pub fn encrypt_tokens(
    cipher: &TokenCipher,
    access_token: &str,
    refresh_token: &str,
    aad: &[u8],
) -> Result<(String, String), AppError> {
    Ok((
        cipher.encrypt(access_token, aad)?,
        cipher.encrypt(refresh_token, aad)?,
    ))
}

/// Decrypt an access/refresh pair after loading.
pub fn decrypt_tokens(
    cipher: &TokenCipher,
    encrypted_access: &str,
    encrypted_refresh: &str,
    aad: &[u8],
) -> Result<(String, String), AppError> {
    Ok((
        cipher.decrypt(encrypted_access, aad)?,
        cipher.decrypt(encrypted_refresh, aad)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypted_tokens_decrypt_with_same_aad() {
        let cipher = TokenCipher::new("storage-key").unwrap();
        let sealed = cipher.encrypt("access-token", b"driver_example_com").unwrap();
        assert_ne!(sealed, BASE64.encode("access-token"));
        assert_eq!(
            cipher.decrypt(&sealed, b"driver_example_com").unwrap(),
            "access-token"
        );
    }

    #[test]
    fn wrong_aad_or_key_fails() {
        let cipher = TokenCipher::new("storage-key").unwrap();
        let sealed = cipher.encrypt("access-token", b"account_a").unwrap();
        assert!(cipher.decrypt(&sealed, b"account_b").is_err());

        let other = TokenCipher::new("other-key").unwrap();
        assert!(other.decrypt(&sealed, b"account_a").is_err());
    }

    #[test]
    fn nonces_differ_between_calls() {
        let cipher = TokenCipher::new("storage-key").unwrap();
        let a = cipher.encrypt("same", b"aad").unwrap();
        let b = cipher.encrypt("same", b"aad").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn plaintext_mode_is_base64() {
        let cipher = TokenCipher::plaintext();
        assert!(!cipher.is_encrypting());
        let encoded = cipher.encrypt("access-token", b"ignored").unwrap();
        assert_eq!(encoded, BASE64.encode("access-token"));
        assert_eq!(cipher.decrypt(&encoded, b"other").unwrap(), "access-token");
    }

    #[test]
    fn short_ciphertext_is_rejected() {
        let cipher = TokenCipher::new("storage-key").unwrap();
        assert!(matches!(
            cipher.decrypt(&BASE64.encode([1u8, 2, 3]), b"aad"),
            Err(AppError::Storage(_))
        ));
    }
}
