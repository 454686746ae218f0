// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod command;
pub mod fields;
pub mod snapshot;
pub mod token;

pub use command::{CommandRequest, Seat, VehicleCommand};
pub use fields::{FieldReading, FieldSpec, FIELDS};
pub use snapshot::{Section, Snapshot};
pub use token::{AuthStatus, Credentials, LoginSecret, TokenScheme, TokenState};
