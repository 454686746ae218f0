// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod cipher;
pub mod client;
pub mod coordinator;
pub mod dispatcher;
pub mod registry;
pub mod signing;

pub use auth::{AccessToken, AuthManager, AuthSummary};
pub use cipher::TokenCipher;
pub use client::ZeekrClient;
pub use coordinator::{SnapshotCoordinator, UpdateStatus};
pub use dispatcher::CommandDispatcher;
pub use registry::{VehicleHandle, VehicleRegistry};
pub use signing::SignatureEngine;
