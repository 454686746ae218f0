// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-vehicle service bundles, keyed by VIN.

use crate::config::Config;
use crate::db::{store_key, TokenStore};
use crate::error::AppError;
use crate::services::auth::AuthManager;
use crate::services::cipher::TokenCipher;
use crate::services::client::ZeekrClient;
use crate::services::coordinator::SnapshotCoordinator;
use crate::services::dispatcher::CommandDispatcher;
use crate::services::signing::SignatureEngine;
use dashmap::DashMap;
use std::sync::Arc;

/// Everything needed to serve one vehicle.
pub struct VehicleHandle {
    pub vin: String,
    pub auth: Arc<AuthManager>,
    pub coordinator: Arc<SnapshotCoordinator>,
    pub dispatcher: CommandDispatcher,
}

impl VehicleHandle {
    /// Wire up the services for the vehicle described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let credentials = config
            .credentials()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid credentials: {}", e)))?;

        let cipher = TokenCipher::from_config(config.token_storage_key.as_deref())?;
        let key = store_key(
            Some(credentials.identifier.as_str()),
            Some(credentials.vin.as_str()),
        );
        let store = TokenStore::file(&config.token_storage_dir, key, cipher);

        Self::with_store(config, store)
    }

    /// Like [`VehicleHandle::from_config`] with an explicit token store.
    pub fn with_store(config: &Config, store: TokenStore) -> Result<Self, AppError> {
        let credentials = config
            .credentials()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid credentials: {}", e)))?;

        let signer = Arc::new(SignatureEngine::new(config.app_secret.as_deref()));
        let client = ZeekrClient::new(&config.base_url, signer)?;

        let auth = Arc::new(AuthManager::new(
            client.clone(),
            store,
            credentials,
            config.token_scheme,
        )?);
        let coordinator = Arc::new(SnapshotCoordinator::new(
            client.clone(),
            auth.clone(),
            config.poll_interval,
        ));
        let dispatcher =
            CommandDispatcher::new(client, auth.clone(), coordinator.clone(), config.settle_delay);

        Ok(Self {
            vin: config.vin.clone(),
            auth,
            coordinator,
            dispatcher,
        })
    }
}

/// Vehicles served by this process.
#[derive(Default)]
pub struct VehicleRegistry {
    vehicles: DashMap<String, Arc<VehicleHandle>>,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: VehicleHandle) -> Arc<VehicleHandle> {
        let handle = Arc::new(handle);
        self.vehicles.insert(handle.vin.clone(), handle.clone());
        handle
    }

    pub fn get(&self, vin: &str) -> Option<Arc<VehicleHandle>> {
        self.vehicles
            .get(&vin.to_ascii_uppercase())
            .map(|entry| entry.value().clone())
    }

    /// Registered VINs, sorted.
    pub fn vins(&self) -> Vec<String> {
        let mut vins: Vec<String> = self.vehicles.iter().map(|e| e.key().clone()).collect();
        vins.sort();
        vins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let config = Config {
            vin: "VIN123".to_string(),
            ..Config::default()
        };
        let registry = VehicleRegistry::new();
        let handle = VehicleHandle::with_store(
            &config,
            TokenStore::in_memory("test".to_string()),
        )
        .unwrap();
        registry.insert(handle);

        assert!(registry.get("vin123").is_some());
        assert!(registry.get("OTHER").is_none());
        assert_eq!(registry.vins(), vec!["VIN123".to_string()]);
    }
}
