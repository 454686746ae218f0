// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Zeekr-Bridge: expose a Zeekr vehicle's telematics API as polled state
//! and remote commands.
//!
//! This crate owns the token lifecycle, the periodic multi-endpoint
//! snapshot, request signing and the command path. A small HTTP API
//! lets a home-automation host read the snapshot and trigger commands.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::VehicleRegistry;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub registry: VehicleRegistry,
}
