// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable per-account storage for the vehicle token pair.
//!
//! One JSON file per account, `zeekr_tokens_<key>.json`, holding a
//! `{"version": 1, "data": {...}}` envelope. Token strings inside are
//! sealed with [`TokenCipher`]; expiries and ids are stored in clear.

use crate::error::AppError;
use crate::models::TokenState;
use crate::services::cipher::{decrypt_tokens, encrypt_tokens, TokenCipher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const STORE_VERSION: u32 = 1;
const FILE_PREFIX: &str = "zeekr_tokens_";

/// On-disk envelope.
#[derive(Serialize, Deserialize)]
struct StoredEnvelope {
    version: u32,
    data: StoredTokens,
}

#[derive(Serialize, Deserialize)]
struct StoredTokens {
    access_token_encrypted: String,
    refresh_token_encrypted: String,
    access_expiry: DateTime<Utc>,
    refresh_expiry: DateTime<Utc>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    open_id: Option<String>,
    device_id: String,
    #[serde(default)]
    vin: Option<String>,
    /// Whether the token strings are encrypted or only base64-encoded.
    encrypted: bool,
}

#[derive(Clone)]
enum Backend {
    File(PathBuf),
    /// Serialized envelope kept in memory (tests).
    Memory(Arc<Mutex<Option<String>>>),
}

/// Token store for one account.
#[derive(Clone)]
pub struct TokenStore {
    backend: Backend,
    key: String,
    cipher: TokenCipher,
}

impl TokenStore {
    /// File-backed store in `dir`.
    pub fn file(dir: impl AsRef<Path>, key: String, cipher: TokenCipher) -> Self {
        let path = dir
            .as_ref()
            .join(format!("{}{}.json", FILE_PREFIX, key));
        Self {
            backend: Backend::File(path),
            key,
            cipher,
        }
    }

    /// Volatile store for tests and token-less setups.
    pub fn in_memory(key: String) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(None))),
            key,
            cipher: TokenCipher::plaintext(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the backing file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File(path) => Some(path),
            Backend::Memory(_) => None,
        }
    }

    /// Load the persisted state. `Ok(None)` when nothing was saved yet.
    pub async fn load(&self) -> Result<Option<TokenState>, AppError> {
        let raw = match &self.backend {
            Backend::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    return Err(AppError::Storage(format!(
                        "Failed to read {}: {}",
                        path.display(),
                        e
                    )))
                }
            },
            Backend::Memory(slot) => match slot.lock().await.clone() {
                Some(raw) => raw,
                None => return Ok(None),
            },
        };

        let envelope: StoredEnvelope = serde_json::from_str(&raw)
            .map_err(|e| AppError::Storage(format!("Corrupt token file: {}", e)))?;

        if envelope.version != STORE_VERSION {
            return Err(AppError::Storage(format!(
                "Unsupported token file version {}",
                envelope.version
            )));
        }

        let stored = envelope.data;
        if stored.encrypted != self.cipher.is_encrypting() {
            return Err(AppError::Storage(
                "Token file encryption does not match TOKEN_STORAGE_KEY".to_string(),
            ));
        }

        let (access_token, refresh_token) = decrypt_tokens(
            &self.cipher,
            &stored.access_token_encrypted,
            &stored.refresh_token_encrypted,
            self.key.as_bytes(),
        )?;

        let mut state = TokenState::new(
            access_token,
            refresh_token,
            stored.access_expiry,
            stored.refresh_expiry,
            stored.device_id,
        );
        state.user_id = stored.user_id;
        state.open_id = stored.open_id;
        state.vin = stored.vin;

        Ok(Some(state))
    }

    /// Persist `state`, replacing whatever was stored before.
    pub async fn save(&self, state: &TokenState) -> Result<(), AppError> {
        let (access_token_encrypted, refresh_token_encrypted) = encrypt_tokens(
            &self.cipher,
            &state.access_token,
            &state.refresh_token,
            self.key.as_bytes(),
        )?;

        let envelope = StoredEnvelope {
            version: STORE_VERSION,
            data: StoredTokens {
                access_token_encrypted,
                refresh_token_encrypted,
                access_expiry: state.access_expiry,
                refresh_expiry: state.refresh_expiry,
                user_id: state.user_id.clone(),
                open_id: state.open_id.clone(),
                device_id: state.device_id.clone(),
                vin: state.vin.clone(),
                encrypted: self.cipher.is_encrypting(),
            },
        };

        let raw = serde_json::to_string_pretty(&envelope)
            .map_err(|e| AppError::Storage(format!("Failed to serialize tokens: {}", e)))?;

        match &self.backend {
            Backend::File(path) => write_atomic(path, raw.as_bytes()).await?,
            Backend::Memory(slot) => *slot.lock().await = Some(raw),
        }

        tracing::debug!(store_key = %self.key, "Tokens persisted");
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), AppError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", dir.display(), e)))?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to replace {}: {}", path.display(), e)))?;

    Ok(())
}

/// Storage key for an account: the email with `@` and `.` replaced by
/// `_`, else the VIN, else `default`.
pub fn store_key(identifier: Option<&str>, vin: Option<&str>) -> String {
    let sanitize = |s: &str| s.trim().replace(['@', '.', '/', '\\'], "_");

    match (identifier.filter(|s| !s.trim().is_empty()), vin.filter(|s| !s.trim().is_empty())) {
        (Some(email), _) => sanitize(email),
        (None, Some(vin)) => sanitize(vin),
        (None, None) => "default".to_string(),
    }
}
