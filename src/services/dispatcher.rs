// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote command path.
//!
//! Commands never raise: transport and HTTP failures are logged and
//! reported as `None`. A rejected token is renewed once and the command
//! retried once. Every HTTP 200 schedules a snapshot refresh after the
//! settle delay.

use crate::models::CommandRequest;
use crate::services::auth::{AccessToken, AuthManager};
use crate::services::client::{ApiResponse, ZeekrClient};
use crate::services::coordinator::SnapshotCoordinator;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends remote commands for one vehicle.
pub struct CommandDispatcher {
    client: ZeekrClient,
    auth: Arc<AuthManager>,
    coordinator: Arc<SnapshotCoordinator>,
    settle_delay: Duration,
}

impl CommandDispatcher {
    pub fn new(
        client: ZeekrClient,
        auth: Arc<AuthManager>,
        coordinator: Arc<SnapshotCoordinator>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            client,
            auth,
            coordinator,
            settle_delay,
        }
    }

    /// Send a command. Returns the response body for any HTTP 200, including
    /// envelopes that report `"success": false`; see [`is_refused`].
    pub async fn send(&self, command: &CommandRequest) -> Option<Value> {
        let vin = self.auth.vin();
        let description = command.description.as_str();

        let token = match self.auth.ensure_valid().await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(vin, command = description, error = %e, "No valid token for command");
                return None;
            }
        };

        let mut response = self.post(command, &token).await?;

        if response.is_auth_rejection() {
            tracing::info!(vin, command = description, status = %response.status, "Command rejected, renewing token");
            let renewed = match self.auth.renew_after_rejection(&token).await {
                Ok(renewed) => renewed,
                Err(e) => {
                    tracing::error!(vin, command = description, error = %e, "Token renewal failed");
                    return None;
                }
            };
            response = self.post(command, &renewed).await?;
        }

        if response.status != StatusCode::OK {
            tracing::error!(
                vin,
                command = description,
                status = %response.status,
                body = %truncate(&response.body, 500),
                "Command failed"
            );
            return None;
        }

        // Any 200 may have changed the vehicle, so the snapshot is always
        // re-synced; the body is handed back as-is when it is not JSON.
        let body = match response.json() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(vin, command = description, error = %e, "Non-JSON command response");
                Value::String(response.body)
            }
        };

        if is_refused(&body) {
            let code = body.get("code").map(ToString::to_string).unwrap_or_default();
            let msg = body
                .get("msg")
                .and_then(|m| m.as_str())
                .unwrap_or_default();
            tracing::error!(vin, command = description, code = %code, msg, "Command refused by vehicle API");
        } else {
            tracing::info!(vin, command = description, "Command accepted");
        }

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        self.coordinator.request_refresh();

        Some(body)
    }

    async fn post(&self, command: &CommandRequest, token: &AccessToken) -> Option<ApiResponse> {
        match self
            .client
            .post(
                &command.endpoint,
                &command.payload,
                token.request_auth(self.auth.vin()),
                COMMAND_TIMEOUT,
            )
            .await
        {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::error!(
                    vin = self.auth.vin(),
                    command = command.description.as_str(),
                    error = %e,
                    "Command request failed"
                );
                None
            }
        }
    }
}

/// Envelope explicitly reporting `"success": false`.
pub fn is_refused(body: &Value) -> bool {
    body.get("success") == Some(&Value::Bool(false))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
