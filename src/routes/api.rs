// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vehicle API routes (bearer-token protected).

use crate::error::{AppError, Result};
use crate::models::fields::{read_all, FieldReading};
use crate::models::{Snapshot, VehicleCommand};
use crate::services::dispatcher::is_refused;
use crate::services::{AuthSummary, UpdateStatus, VehicleHandle};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require the bridge API token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/vehicles", get(list_vehicles))
        .route("/api/vehicles/{vin}/snapshot", get(get_snapshot))
        .route("/api/vehicles/{vin}/status", get(get_status))
        .route("/api/vehicles/{vin}/fields", get(get_fields))
        .route("/api/vehicles/{vin}/refresh", post(request_refresh))
        .route("/api/vehicles/{vin}/commands", post(send_command))
}

fn vehicle(state: &AppState, vin: &str) -> Result<Arc<VehicleHandle>> {
    state
        .registry
        .get(vin)
        .ok_or_else(|| AppError::NotFound(format!("Vehicle {}", vin)))
}

/// Latest snapshot with its fetch time, or 503 before the first success.
async fn published_snapshot(handle: &VehicleHandle) -> Result<(Arc<Snapshot>, Option<String>)> {
    let status = handle.coordinator.update_status().await;
    match handle.coordinator.current() {
        Some(snapshot) => Ok((snapshot, status.last_success_at.map(format_utc_rfc3339))),
        None => Err(AppError::UpdateFailed {
            message: status
                .last_error
                .unwrap_or_else(|| "No snapshot available yet".to_string()),
            reauth_required: status.reauth_required,
        }),
    }
}

// ─── Vehicles ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "bindings/")
)]
pub struct VehiclesResponse {
    pub vehicles: Vec<String>,
}

async fn list_vehicles(State(state): State<Arc<AppState>>) -> Json<VehiclesResponse> {
    Json(VehiclesResponse {
        vehicles: state.registry.vins(),
    })
}

// ─── Snapshot ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SnapshotResponse {
    pub vin: String,
    pub fetched_at: Option<String>,
    pub snapshot: Snapshot,
}

async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(vin): Path<String>,
) -> Result<Json<SnapshotResponse>> {
    let handle = vehicle(&state, &vin)?;
    let (snapshot, fetched_at) = published_snapshot(&handle).await?;

    Ok(Json(SnapshotResponse {
        vin: handle.vin.clone(),
        fetched_at,
        snapshot: (*snapshot).clone(),
    }))
}

#[derive(Serialize)]
pub struct FieldsResponse {
    pub vin: String,
    pub fetched_at: Option<String>,
    pub fields: BTreeMap<&'static str, FieldReading>,
}

async fn get_fields(
    State(state): State<Arc<AppState>>,
    Path(vin): Path<String>,
) -> Result<Json<FieldsResponse>> {
    let handle = vehicle(&state, &vin)?;
    let (snapshot, fetched_at) = published_snapshot(&handle).await?;

    Ok(Json(FieldsResponse {
        vin: handle.vin.clone(),
        fetched_at,
        fields: read_all(&snapshot),
    }))
}

// ─── Status & Refresh ────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub vin: String,
    pub auth: AuthSummary,
    pub update: UpdateStatus,
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(vin): Path<String>,
) -> Result<Json<StatusResponse>> {
    let handle = vehicle(&state, &vin)?;

    Ok(Json(StatusResponse {
        vin: handle.vin.clone(),
        auth: handle.auth.summary().await,
        update: handle.coordinator.update_status().await,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "bindings/")
)]
pub struct RefreshResponse {
    pub status: String,
}

async fn request_refresh(
    State(state): State<Arc<AppState>>,
    Path(vin): Path<String>,
) -> Result<(StatusCode, Json<RefreshResponse>)> {
    let handle = vehicle(&state, &vin)?;
    handle.coordinator.request_refresh();
    tracing::info!(vin = %handle.vin, "On-demand refresh requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            status: "queued".to_string(),
        }),
    ))
}

// ─── Commands ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CommandResponse {
    pub accepted: bool,
    pub description: String,
    /// Body returned by the vehicle API
    pub response: Value,
}

async fn send_command(
    State(state): State<Arc<AppState>>,
    Path(vin): Path<String>,
    Json(command): Json<VehicleCommand>,
) -> Result<Json<CommandResponse>> {
    let handle = vehicle(&state, &vin)?;
    command.validate().map_err(AppError::BadRequest)?;

    let request = command.to_request();
    tracing::info!(vin = %handle.vin, command = %request.description, "Sending command");

    match handle.dispatcher.send(&request).await {
        Some(response) if is_refused(&response) => Err(AppError::CommandFailed(request.description)),
        Some(response) => Ok(Json(CommandResponse {
            accepted: true,
            description: request.description,
            response,
        })),
        None => Err(AppError::CommandFailed(request.description)),
    }
}
